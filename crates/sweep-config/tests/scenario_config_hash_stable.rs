//! Config hash stability.
//!
//! GREEN when:
//! - Loading the same layers twice yields the same config_hash.
//! - Reordering keys within YAML doesn't change the hash.
//! - Different values produce different hashes.
//! - Overlay layers override base values.

use sweep_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
ingest:
  sources: ["/var/log/auth.log", "/var/log/syslog"]
  window_minutes: 60
ledger:
  path: "data/vault.jsonl"
sink:
  path: "data/stream.jsonl"
anchor:
  enabled: false
  api_key_env: "SWEEP_ANCHOR_API_KEY"
"#;

const BASE_YAML_REORDERED: &str = r#"
anchor:
  api_key_env: "SWEEP_ANCHOR_API_KEY"
  enabled: false
sink:
  path: "data/stream.jsonl"
ledger:
  path: "data/vault.jsonl"
ingest:
  window_minutes: 60
  sources: ["/var/log/auth.log", "/var/log/syslog"]
"#;

const OVERLAY_YAML: &str = r#"
ingest:
  window_minutes: 15
schedule:
  interval_secs: 30
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
    assert_eq!(original.config, reordered.config);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(loaded.config.ingest.window_minutes, 15);
    assert_eq!(loaded.config.schedule.interval_secs, 30);
    // Untouched siblings survive the merge.
    assert_eq!(loaded.config.ingest.sources.len(), 2);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

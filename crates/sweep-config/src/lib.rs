//! sweep-config
//!
//! Layered YAML -> canonical JSON -> typed, validated [`SweepConfig`].
//!
//! Layers merge in order: earlier documents are the base, later documents
//! override. The canonical JSON of the merged document is hashed so a cycle
//! report can be attributed to the exact effective configuration.

mod error;
pub mod secrets;

pub use error::ConfigError;
pub use secrets::{resolve_anchor_secret, AnchorSecret};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

/// Known secret-like prefixes. Any leaf string starting with one of these
/// aborts loading with `CONFIG_SECRET_DETECTED`.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
];

pub const DEFAULT_ANCHOR_KEY_ENV: &str = "SWEEP_ANCHOR_API_KEY";
pub const DEFAULT_ANCHOR_TIMEOUT_SECS: u64 = 10;
pub const MAX_ANCHOR_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    pub ingest: IngestConfig,
    pub ledger: LedgerConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub dedupe: DedupeConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Log source paths, processed in this order.
    pub sources: Vec<PathBuf>,
    /// Retention window in minutes (inclusive on both ends).
    pub window_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the relay API key.
    #[serde(default = "default_anchor_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_anchor_timeout")]
    pub timeout_secs: u64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key_env: default_anchor_key_env(),
            timeout_secs: default_anchor_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DedupeConfig {
    /// Persistent seen-signature store; `None` keeps dedup scoped to one cycle.
    #[serde(default)]
    pub seen_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

fn default_anchor_key_env() -> String {
    DEFAULT_ANCHOR_KEY_ENV.to_string()
}

fn default_anchor_timeout() -> u64 {
    DEFAULT_ANCHOR_TIMEOUT_SECS
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl SweepConfig {
    /// Startup-time validation. Runs after schema deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.sources.is_empty() {
            return Err(ConfigError::Missing {
                field: "ingest.sources",
            });
        }
        if self
            .ingest
            .sources
            .iter()
            .any(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "ingest.sources",
                reason: "empty source path".to_string(),
            });
        }
        if self.ingest.window_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "ingest.window_minutes",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.ledger.path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "ledger.path",
            });
        }
        if self.sink.path.as_os_str().is_empty() {
            return Err(ConfigError::Missing { field: "sink.path" });
        }
        // The ledger file is exclusively owned by the ledger.
        if self.sink.path == self.ledger.path {
            return Err(ConfigError::Invalid {
                field: "sink.path",
                reason: "must differ from ledger.path".to_string(),
            });
        }
        if let Some(seen) = &self.dedupe.seen_path {
            if seen == &self.ledger.path || seen == &self.sink.path {
                return Err(ConfigError::Invalid {
                    field: "dedupe.seen_path",
                    reason: "must differ from ledger.path and sink.path".to_string(),
                });
            }
        }
        if self.anchor.enabled {
            let endpoint = self
                .anchor
                .endpoint
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing {
                    field: "anchor.endpoint",
                })?;
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(ConfigError::Invalid {
                    field: "anchor.endpoint",
                    reason: "expected an http(s) URL".to_string(),
                });
            }
            if self.anchor.api_key_env.trim().is_empty() {
                return Err(ConfigError::Missing {
                    field: "anchor.api_key_env",
                });
            }
        }
        if self.anchor.timeout_secs == 0 || self.anchor.timeout_secs > MAX_ANCHOR_TIMEOUT_SECS {
            return Err(ConfigError::Invalid {
                field: "anchor.timeout_secs",
                reason: format!("must be within 1..={MAX_ANCHOR_TIMEOUT_SECS}"),
            });
        }
        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "schedule.interval_secs",
                reason: "must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
    pub config: SweepConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig, ConfigError> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw = fs::read_to_string(p).map_err(|e| ConfigError::Read {
            path: p.to_string(),
            message: e.to_string(),
        })?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig, ConfigError> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        let v_json = serde_json::to_value(v_yaml)
            .map_err(|e| ConfigError::Yaml(format!("yaml->json conversion failed: {e}")))?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());

    let config: SweepConfig = serde_json::from_value(merged.clone())
        .map_err(|e| ConfigError::Schema(e.to_string()))?;
    config.validate()?;

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
        config,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String, ConfigError> {
    serde_json::to_string(&sort_keys(v)).map_err(|e| ConfigError::Schema(e.to_string()))
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<(), ConfigError> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                return Err(ConfigError::SecretDetected { pointer: ptr });
            }
        }
    }
    Ok(())
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => out.push(prefix.to_string()),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

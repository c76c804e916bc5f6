//! Ledger hash chain linkage
//!
//! GREEN when:
//! - Three appends yield indices 0, 1, 2 with previous_hash null -> h0 -> h1.
//! - The hash of a known anomaly equals a fixed golden value, so the canonical
//!   form cannot drift silently.
//! - Reopening the ledger continues the chain without a gap.
//! - Each stored hash recomputes from the anomaly payload.
//! - The evidence lines in related_entries are covered by the hash.

use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use sweep_ledger::canonical::{canonical_payload, record_hash};
use sweep_ledger::{read_pointers, IntegrityLedger};
use sweep_schemas::{Anomaly, Severity, META_DIRECTION, META_SOURCE};

const GOLDEN_H0: &str = "c2850c7bfa614dd456a4c28439d1c308a8b88a076c79d8e54f4b70b9afb2d3b9";
const GOLDEN_H1: &str = "23d8adb79a8032b3290c182df116bda9a7cf5627a975a7d3d6401e065908edba";

fn forward(pos: usize) -> Anomaly {
    let mut metadata = BTreeMap::new();
    metadata.insert(META_SOURCE.to_string(), Value::from("/var/log/auth.log"));
    metadata.insert(META_DIRECTION.to_string(), Value::from("forward"));
    Anomaly {
        id: format!("forward-{pos}"),
        severity: Severity::Medium,
        description: "Suspicious log message detected in forward pass".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        score: 0.5,
        metadata,
        related_entries: vec![format!("line {pos} failed")],
    }
}

#[test]
fn three_appends_link_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault").join("ledger.jsonl");

    let mut ledger = IntegrityLedger::open(&path).unwrap();
    let recs = ledger
        .append(&[forward(0), forward(1), forward(2)])
        .unwrap();

    assert_eq!(
        recs.iter().map(|r| r.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(recs[0].previous_hash, None);
    assert_eq!(recs[1].previous_hash.as_deref(), Some(recs[0].hash.as_str()));
    assert_eq!(recs[2].previous_hash.as_deref(), Some(recs[1].hash.as_str()));
    assert_eq!(ledger.head(), Some(recs[2].hash.as_str()));
    assert_eq!(ledger.next_index(), 3);

    assert_eq!(recs[0].hash, GOLDEN_H0);
    assert_eq!(recs[1].hash, GOLDEN_H1);
}

#[test]
fn reopen_continues_without_gap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");

    let first = {
        let mut ledger = IntegrityLedger::open(&path).unwrap();
        ledger.append(&[forward(0), forward(1)]).unwrap()
    };

    let mut ledger = IntegrityLedger::open(&path).unwrap();
    assert_eq!(ledger.next_index(), 2);
    assert_eq!(ledger.head(), Some(first[1].hash.as_str()));

    let next = ledger.append(&[forward(7)]).unwrap();
    assert_eq!(next[0].index, 2);
    assert_eq!(next[0].previous_hash.as_deref(), Some(first[1].hash.as_str()));

    let stored = read_pointers(&path).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[2], next[0].pointer());
}

#[test]
fn stored_hashes_recompute_from_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let batch = vec![forward(0), forward(3), forward(9)];

    let mut ledger = IntegrityLedger::open(&path).unwrap();
    ledger.append(&batch).unwrap();
    drop(ledger);

    let stored = read_pointers(&path).unwrap();
    for (p, a) in stored.iter().zip(&batch) {
        let recomputed =
            record_hash(p.index, &canonical_payload(a), p.previous_hash.as_deref()).unwrap();
        assert_eq!(recomputed, p.hash, "record {}", p.index);
        assert_eq!(p.anomaly_id, a.id);
    }
}

#[test]
fn related_entries_are_part_of_the_hash() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = forward(0);
    a.related_entries = vec!["something else entirely".to_string()];

    let mut ledger = IntegrityLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let recs = ledger.append(&[a]).unwrap();
    assert_ne!(recs[0].hash, GOLDEN_H0);

    let payload = canonical_payload(&forward(0));
    assert_eq!(payload["related_entries"][0], "line 0 failed");
}

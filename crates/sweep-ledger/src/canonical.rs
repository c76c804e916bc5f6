//! Canonical serialization and record hashing.
//!
//! Canonical JSON: keys sorted recursively, separators `,` and `:`, UTF-8.
//! `record_hash = sha256_hex(canonical({index, payload, previous_hash}))`.

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sweep_schemas::{iso8601, Anomaly};

use crate::LedgerError;

/// Canonicalize by sorting keys recursively and emitting compact JSON.
pub fn canonical_json<T: Serialize>(v: &T) -> Result<String, LedgerError> {
    let raw = serde_json::to_value(v).map_err(|e| LedgerError::Serialize(e.to_string()))?;
    serde_json::to_string(&sort_keys(&raw)).map_err(|e| LedgerError::Serialize(e.to_string()))
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

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The content an anomaly contributes to its ledger hash. Not stored in the
/// ledger; the sink stream carries it.
pub fn canonical_payload(a: &Anomaly) -> Value {
    json!({
        "anomaly_id": a.id,
        "severity": a.severity.as_str(),
        "description": a.description,
        "timestamp": iso8601(&a.timestamp),
        "score": a.score,
        "metadata": a.metadata,
        "related_entries": a.related_entries,
    })
}

pub fn record_hash(
    index: u64,
    payload: &Value,
    previous_hash: Option<&str>,
) -> Result<String, LedgerError> {
    let combined = json!({
        "index": index,
        "payload": payload,
        "previous_hash": previous_hash,
    });
    Ok(sha256_hex(canonical_json(&combined)?.as_bytes()))
}

/// 64 lowercase hex characters.
pub fn is_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

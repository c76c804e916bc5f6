//! sweep-schemas
//!
//! Shared data model for the detection -> merge -> ledger pipeline.
//!
//! - [`LogEntry`] lives for one cycle only and is never persisted.
//! - [`Anomaly`] is produced by a detector and never mutated afterwards.
//! - [`VaultRecord`] is the in-memory view of one ledger link; [`LedgerPointer`]
//!   is the exact line written to the ledger file.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Canonical ISO-8601 rendering used everywhere a timestamp enters a hash or a
/// downstream stream: microsecond precision, explicit `+00:00` offset.
pub fn iso8601(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Serde adapter for [`iso8601`]. Parsing accepts any RFC 3339 timestamp.
pub mod iso8601_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::iso8601(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Time of parsing, not any timestamp embedded in the line.
    pub timestamp: DateTime<Utc>,
    /// Source identifier (the configured path).
    pub source: String,
    /// Line text with surrounding whitespace stripped.
    pub raw: String,
    pub parsed: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scan direction of the detector that produced an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

/// Metadata keys every detector must set.
pub const META_SOURCE: &str = "source";
pub const META_DIRECTION: &str = "direction";

/// A detection result. Field order matches the downstream stream layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub severity: Severity,
    pub description: String,
    #[serde(with = "iso8601_serde")]
    pub timestamp: DateTime<Utc>,
    /// In `[0, 1]`.
    pub score: f64,
    pub metadata: BTreeMap<String, Value>,
    pub related_entries: Vec<String>,
}

impl Anomaly {
    /// Deduplication key: description plus the related-entry multiset.
    pub fn signature(&self) -> (String, Vec<String>) {
        let mut related = self.related_entries.clone();
        related.sort();
        (self.description.clone(), related)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).and_then(Value::as_str)
    }

    pub fn direction(&self) -> Option<&str> {
        self.metadata.get(META_DIRECTION).and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One link of the integrity chain as returned by an append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    /// 0-based, contiguous.
    pub index: u64,
    /// Time of append (not the anomaly's detection time).
    pub timestamp: DateTime<Utc>,
    pub anomaly_id: String,
    /// 64 lowercase hex chars.
    pub hash: String,
    /// `None` only for index 0.
    pub previous_hash: Option<String>,
}

impl VaultRecord {
    pub fn pointer(&self) -> LedgerPointer {
        LedgerPointer {
            index: self.index,
            anomaly_id: self.anomaly_id.clone(),
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
        }
    }
}

/// The persisted line: `{"index", "anomaly_id", "hash", "previous_hash"}`.
/// The anomaly payload is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerPointer {
    pub index: u64,
    pub anomaly_id: String,
    pub hash: String,
    pub previous_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Anomaly {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_SOURCE.to_string(), Value::from("/var/log/auth.log"));
        metadata.insert(META_DIRECTION.to_string(), Value::from("forward"));
        Anomaly {
            id: "forward-0".to_string(),
            severity: Severity::Medium,
            description: "d".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            score: 0.5,
            metadata,
            related_entries: vec!["b".to_string(), "a".to_string()],
        }
    }

    #[test]
    fn iso8601_has_micros_and_offset() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(iso8601(&ts), "2024-03-01T12:00:00.000000+00:00");
    }

    #[test]
    fn signature_sorts_related_entries() {
        let a = sample();
        assert_eq!(
            a.signature(),
            ("d".to_string(), vec!["a".to_string(), "b".to_string()])
        );
        // Original order untouched.
        assert_eq!(a.related_entries, vec!["b", "a"]);
    }

    #[test]
    fn anomaly_serializes_stream_layout() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["severity"], "medium");
        assert_eq!(v["timestamp"], "2024-03-01T12:00:00.000000+00:00");
        assert_eq!(v["metadata"]["direction"], "forward");

        let back: Anomaly = serde_json::from_value(v).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn pointer_rejects_payload_fields() {
        let line = r#"{"index":0,"anomaly_id":"x","hash":"h","previous_hash":null,"payload":{}}"#;
        assert!(serde_json::from_str::<LedgerPointer>(line).is_err());
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert_eq!(Severity::Low.to_string(), "low");
    }
}

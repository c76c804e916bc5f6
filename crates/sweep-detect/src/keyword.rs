use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use sweep_schemas::{Anomaly, Direction, LogEntry, Severity, META_DIRECTION, META_SOURCE};

use crate::Detector;

pub const FORWARD_DESCRIPTION: &str = "Suspicious log message detected in forward pass";
pub const REVERSE_DESCRIPTION: &str = "Privilege-related event detected in reverse pass";

/// Case-insensitive substring rule shared by both sweeps.
#[derive(Debug, Clone)]
struct KeywordRule {
    direction: Direction,
    keywords: &'static [&'static str],
    severity: Severity,
    score: f64,
    description: &'static str,
}

impl KeywordRule {
    fn matches(&self, raw: &str) -> bool {
        let lower = raw.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k))
    }

    /// `position` is the entry's 0-based position in this rule's scan order.
    fn flag(&self, position: usize, entry: &LogEntry, detected_at: DateTime<Utc>) -> Anomaly {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_SOURCE.to_string(), Value::from(entry.source.clone()));
        metadata.insert(
            META_DIRECTION.to_string(),
            Value::from(self.direction.as_str()),
        );
        Anomaly {
            id: format!("{}-{}", self.direction.as_str(), position),
            severity: self.severity,
            description: self.description.to_string(),
            timestamp: detected_at,
            score: self.score,
            metadata,
            related_entries: vec![entry.raw.clone()],
        }
    }
}

/// Flags "failed" / "error", scanning in input order.
#[derive(Debug, Clone)]
pub struct ForwardDetector {
    rule: KeywordRule,
}

impl Default for ForwardDetector {
    fn default() -> Self {
        Self {
            rule: KeywordRule {
                direction: Direction::Forward,
                keywords: &["failed", "error"],
                severity: Severity::Medium,
                score: 0.5,
                description: FORWARD_DESCRIPTION,
            },
        }
    }
}

impl Detector for ForwardDetector {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn detect(&self, entries: &[LogEntry], detected_at: DateTime<Utc>) -> Vec<Anomaly> {
        entries
            .iter()
            .enumerate()
            .filter(|(_, e)| self.rule.matches(&e.raw))
            .map(|(i, e)| self.rule.flag(i, e, detected_at))
            .collect()
    }
}

/// Flags "sudo" / "root", scanning newest-first.
///
/// Walks a reversed view; the caller's slice is left untouched.
#[derive(Debug, Clone)]
pub struct ReverseDetector {
    rule: KeywordRule,
}

impl Default for ReverseDetector {
    fn default() -> Self {
        Self {
            rule: KeywordRule {
                direction: Direction::Reverse,
                keywords: &["sudo", "root"],
                severity: Severity::High,
                score: 0.8,
                description: REVERSE_DESCRIPTION,
            },
        }
    }
}

impl Detector for ReverseDetector {
    fn name(&self) -> &'static str {
        "reverse"
    }

    fn detect(&self, entries: &[LogEntry], detected_at: DateTime<Utc>) -> Vec<Anomaly> {
        entries
            .iter()
            .rev()
            .enumerate()
            .filter(|(_, e)| self.rule.matches(&e.raw))
            .map(|(i, e)| self.rule.flag(i, e, detected_at))
            .collect()
    }
}

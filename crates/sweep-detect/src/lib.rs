//! sweep-detect
//!
//! Detection passes and the deduplicating merge.
//!
//! A [`Detector`] consumes an ordered slice of entries and produces zero or
//! more anomalies. The merge step and the ledger only depend on that
//! contract, so new strategies plug in without touching either.
//!
//! Detectors are pure: no I/O, no wall clock. The caller supplies the
//! detection timestamp.

mod keyword;
pub mod merge;
pub mod seen;

pub use keyword::{ForwardDetector, ReverseDetector};
pub use merge::{merge, merge_all};
pub use seen::{signature_digest, SeenStore, StoreError};

use chrono::{DateTime, Utc};
use sweep_schemas::{Anomaly, LogEntry};

/// Detection capability.
///
/// Implementations must not mutate or reorder the caller's entries and must
/// set the `source` and `direction` metadata keys on every anomaly.
pub trait Detector: Send + Sync {
    /// Short, stable name used in logs (e.g. `"forward"`).
    fn name(&self) -> &'static str;

    fn detect(&self, entries: &[LogEntry], detected_at: DateTime<Utc>) -> Vec<Anomaly>;
}

/// Forward then reverse: the default detector set of a pipeline.
pub fn default_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(ForwardDetector::default()),
        Box::new(ReverseDetector::default()),
    ]
}

//! sweep-ingest
//!
//! Reads configured log sources and turns each line into a [`LogEntry`].
//!
//! ## Contract
//! - Sources are processed in the order given; lines keep file order.
//! - A source that cannot be opened or read is skipped (reported, not an error).
//! - Bytes that are not valid UTF-8 are replaced, never rejected.
//! - Blank lines are skipped.
//! - An entry's timestamp is the time of parsing. It is retained only when
//!   `0 <= reference - timestamp <= window`, both bounds inclusive. The
//!   reference is read once per pass, after every source has been parsed.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use sweep_schemas::LogEntry;
use tracing::{debug, warn};

/// Keys always present in [`LogEntry::parsed`].
pub const PARSED_RAW: &str = "raw";
pub const PARSED_SOURCE: &str = "source";
pub const PARSED_LINE: &str = "line";

/// A source that produced no entries because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}

/// Result of one ingestion pass.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub entries: Vec<LogEntry>,
    pub skipped_sources: Vec<SkippedSource>,
    /// Lines parsed but dropped by the window filter.
    pub out_of_window: usize,
}

#[derive(Debug, Clone)]
pub struct Ingestor {
    sources: Vec<PathBuf>,
    window_minutes: u32,
}

impl Ingestor {
    pub fn new(sources: Vec<PathBuf>, window_minutes: u32) -> Self {
        Self {
            sources,
            window_minutes,
        }
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn window_minutes(&self) -> u32 {
        self.window_minutes
    }

    /// Ingest all sources against the wall clock.
    pub fn collect(&self) -> IngestReport {
        self.collect_with_clock(Utc::now)
    }

    /// Ingest all sources; `clock` supplies the parse timestamp of each line
    /// and, read once at the end of the pass, the reference time of the
    /// window check.
    pub fn collect_with_clock<C>(&self, clock: C) -> IngestReport
    where
        C: Fn() -> DateTime<Utc>,
    {
        let mut report = IngestReport::default();
        let mut parsed: Vec<LogEntry> = Vec::new();

        for path in &self.sources {
            let source = path.display().to_string();
            let bytes = match read_source(path) {
                Ok(b) => b,
                Err(reason) => {
                    warn!(source = %source, %reason, "log source unavailable; skipping");
                    report.skipped_sources.push(SkippedSource { source, reason });
                    continue;
                }
            };

            let text = String::from_utf8_lossy(&bytes);
            let before = parsed.len();
            for (i, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                parsed.push(parse_line(line, &source, i + 1, clock()));
            }
            debug!(
                source = %source,
                lines = parsed.len() - before,
                "log source parsed"
            );
        }

        let reference = clock();
        for entry in parsed {
            if within_window(&entry.timestamp, self.window_minutes, &reference) {
                report.entries.push(entry);
            } else {
                report.out_of_window += 1;
            }
        }
        report
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| e.to_string())
}

/// Parse one raw line. `line_no` is 1-based.
pub fn parse_line(line: &str, source: &str, line_no: usize, parsed_at: DateTime<Utc>) -> LogEntry {
    let raw = line.trim().to_string();
    let mut parsed = BTreeMap::new();
    parsed.insert(PARSED_RAW.to_string(), raw.clone());
    parsed.insert(PARSED_SOURCE.to_string(), source.to_string());
    parsed.insert(PARSED_LINE.to_string(), line_no.to_string());
    LogEntry {
        timestamp: parsed_at,
        source: source.to_string(),
        raw,
        parsed,
    }
}

/// `0 <= reference - ts <= window_minutes`, inclusive on both ends.
pub fn within_window(ts: &DateTime<Utc>, window_minutes: u32, reference: &DateTime<Utc>) -> bool {
    let age = *reference - *ts;
    age >= Duration::zero() && age <= Duration::minutes(i64::from(window_minutes))
}

//! Downstream anomaly stream.
//!
//! One JSON object per line, in the field order of [`Anomaly`]. The stream
//! carries no integrity of its own: line `i` holds the payload of ledger
//! record `i`, and [`Sink::align`] keeps it that way after a crash between
//! the two writes.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sweep_schemas::Anomaly;
use tracing::{info, warn};

#[derive(Debug)]
pub enum SinkError {
    Io { path: PathBuf, message: String },
    Serialize(String),
    /// The stream cannot be brought level with the ledger from the payloads
    /// at hand.
    OutOfStep {
        path: PathBuf,
        sink_records: u64,
        ledger_records: u64,
    },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io { path, message } => {
                write!(f, "SINK_IO path={}: {message}", path.display())
            }
            SinkError::Serialize(msg) => write!(f, "SINK_SERIALIZE: {msg}"),
            SinkError::OutOfStep {
                path,
                sink_records,
                ledger_records,
            } => write!(
                f,
                "SINK_OUT_OF_STEP path={} sink_records={sink_records} ledger_records={ledger_records}: \
                 sink stream does not match the ledger",
                path.display()
            ),
        }
    }
}

impl std::error::Error for SinkError {}

fn io_err(path: &Path, e: std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Append-only JSONL writer for merged anomalies.
#[derive(Debug, Clone)]
pub struct Sink {
    path: PathBuf,
}

impl Sink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Discard crash debris at the end of the stream and count its records.
    ///
    /// An unterminated last line and a run of trailing blank or NUL lines
    /// are truncated away. A missing file holds zero records.
    pub fn recover(&self) -> Result<u64, SinkError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_err(&self.path, e)),
        };

        let mut records = 0u64;
        let mut valid_len = 0usize;
        let mut offset = 0usize;
        for raw in bytes.split_inclusive(|b| *b == b'\n') {
            offset += raw.len();
            if raw.last() != Some(&b'\n') {
                break;
            }
            if raw.iter().all(|b| b.is_ascii_whitespace() || *b == 0) {
                continue;
            }
            records += 1;
            valid_len = offset;
        }

        if valid_len < bytes.len() {
            warn!(
                path = %self.path.display(),
                discarded_bytes = bytes.len() - valid_len,
                "sink has an incomplete tail; truncating to last complete record"
            );
            let f = OpenOptions::new()
                .write(true)
                .open(&self.path)
                .map_err(|e| io_err(&self.path, e))?;
            f.set_len(valid_len as u64)
                .map_err(|e| io_err(&self.path, e))?;
            f.sync_all().map_err(|e| io_err(&self.path, e))?;
        }
        Ok(records)
    }

    /// Bring the stream level with a ledger of `ledger_records` records.
    ///
    /// `pending` holds the payloads of the last `pending.len()` ledger
    /// records, in ledger order. Whatever part of it the stream is missing
    /// is appended. Fails with [`SinkError::OutOfStep`] when the stream is
    /// ahead of the ledger or behind the oldest pending payload. Returns the
    /// number of lines written.
    pub fn align(&self, ledger_records: u64, pending: &[Anomaly]) -> Result<usize, SinkError> {
        let have = self.recover()?;
        let base = ledger_records.saturating_sub(pending.len() as u64);
        if have < base || have > ledger_records {
            return Err(SinkError::OutOfStep {
                path: self.path.clone(),
                sink_records: have,
                ledger_records,
            });
        }
        let missing = &pending[(have - base) as usize..];
        if !missing.is_empty() && have > base {
            info!(
                path = %self.path.display(),
                already_written = have - base,
                "sink partly holds the pending batch; appending the rest"
            );
        }
        self.write(missing)
    }

    /// Append `anomalies` in order and sync. Returns the number of lines written.
    ///
    /// A torn tail left by an earlier crash is removed first. The batch is
    /// serialized up front and written with a single call, so a
    /// serialization failure writes nothing.
    pub fn write(&self, anomalies: &[Anomaly]) -> Result<usize, SinkError> {
        if anomalies.is_empty() {
            return Ok(0);
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }

        let mut buf = String::new();
        for a in anomalies {
            let line = serde_json::to_string(a).map_err(|e| SinkError::Serialize(e.to_string()))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        self.recover()?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        f.write_all(buf.as_bytes())
            .map_err(|e| io_err(&self.path, e))?;
        f.sync_data().map_err(|e| io_err(&self.path, e))?;

        info!(path = %self.path.display(), written = anomalies.len(), "sink append");
        Ok(anomalies.len())
    }

    /// Read back every complete line. A missing file is an empty stream.
    pub fn read_all(&self) -> Result<Vec<Anomaly>, SinkError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        let end = text.rfind('\n').map(|i| i + 1).unwrap_or(0);
        text[..end]
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(|e| SinkError::Serialize(e.to_string())))
            .collect()
    }
}

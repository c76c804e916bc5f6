//! Persistent seen-signature store for cross-cycle deduplication.
//!
//! One lowercase hex SHA-256 digest per line. Append-only; an unterminated
//! trailing fragment left by a crash is cut off at open.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use sweep_schemas::Anomaly;
use tracing::warn;

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, message } => {
                write!(f, "SEEN_STORE_IO path={}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {}

fn io_err(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// SHA-256 hex of the canonical JSON `[description, [sorted related entries]]`.
pub fn signature_digest(a: &Anomaly) -> String {
    let (description, related) = a.signature();
    let canonical = serde_json::json!([description, related]).to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub struct SeenStore {
    path: PathBuf,
    seen: HashSet<String>,
}

impl SeenStore {
    /// Load the store, creating parent directories. A missing file is empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let mut seen = HashSet::new();
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(io_err(&path, e)),
        };

        let complete_len = bytes
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        if complete_len < bytes.len() {
            warn!(
                path = %path.display(),
                discarded_bytes = bytes.len() - complete_len,
                "seen store has an unterminated tail; discarding"
            );
            let f = OpenOptions::new()
                .write(true)
                .open(&path)
                .map_err(|e| io_err(&path, e))?;
            f.set_len(complete_len as u64)
                .map_err(|e| io_err(&path, e))?;
            f.sync_all().map_err(|e| io_err(&path, e))?;
        }

        for line in String::from_utf8_lossy(&bytes[..complete_len]).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_digest(line) {
                seen.insert(line.to_string());
            } else {
                warn!(path = %path.display(), "seen store line is not a digest; ignoring");
            }
        }

        Ok(Self { path, seen })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, a: &Anomaly) -> bool {
        self.seen.contains(&signature_digest(a))
    }

    /// Split into `(fresh, already_seen)`, preserving order in both.
    pub fn partition(&self, anomalies: Vec<Anomaly>) -> (Vec<Anomaly>, Vec<Anomaly>) {
        anomalies.into_iter().partition(|a| !self.contains(a))
    }

    /// Persist the signatures of `anomalies`. Returns how many were new.
    pub fn record(&mut self, anomalies: &[Anomaly]) -> Result<usize, StoreError> {
        let mut buf = String::new();
        let mut added = 0usize;
        for a in anomalies {
            let digest = signature_digest(a);
            if self.seen.insert(digest.clone()) {
                buf.push_str(&digest);
                buf.push('\n');
                added += 1;
            }
        }
        if added == 0 {
            return Ok(0);
        }

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        f.write_all(buf.as_bytes())
            .map_err(|e| io_err(&self.path, e))?;
        f.sync_data().map_err(|e| io_err(&self.path, e))?;
        Ok(added)
    }
}

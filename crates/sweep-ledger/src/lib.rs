//! sweep-ledger
//!
//! Append-only, hash-chained integrity ledger. One JSON line per record:
//! `{"anomaly_id","hash","index","previous_hash"}` (canonical key order).
//!
//! - `hash = sha256(canonical({index, payload, previous_hash}))`; the payload
//!   itself is not stored here, the sink stream carries it.
//! - Every line is `sync_data`'d before the in-memory head advances, so a
//!   returned [`VaultRecord`] is durable.
//! - Open and every append reconcile the head from storage; the file is the
//!   single source of truth.

mod error;
mod lock;

pub mod canonical;
pub mod scan;
pub mod verify;

pub use error::LedgerError;
pub use lock::lock_path;
pub use scan::{scan_chain, ChainScan};
pub use verify::{
    verify_chain, verify_chain_str, verify_pointers_str, verify_records, VerifyResult,
};

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use sweep_schemas::{Anomaly, LedgerPointer, VaultRecord};
use tracing::{info, warn};

use crate::canonical::{canonical_json, canonical_payload, record_hash};
use crate::error::io_err;
use crate::lock::WriterGuard;

/// Read the ledger file, treating a missing file as empty.
fn read_bytes(path: &Path) -> Result<Vec<u8>, LedgerError> {
    match fs::read(path) {
        Ok(b) => Ok(b),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Read and scan a ledger without opening it for writing.
pub fn read_pointers(path: impl AsRef<Path>) -> Result<Vec<LedgerPointer>, LedgerError> {
    let path = path.as_ref();
    Ok(scan_chain(&read_bytes(path)?)?.pointers)
}

/// Exclusive writer over one ledger file.
#[derive(Debug)]
pub struct IntegrityLedger {
    path: PathBuf,
    head: Option<String>,
    next_index: u64,
    _guard: WriterGuard,
}

impl IntegrityLedger {
    /// Open (or create) the ledger at `path`, recovering from a torn tail.
    ///
    /// Fails with [`LedgerError::Busy`] if another writer, in this process or
    /// any other, holds the same path (see [`lock_path`]), and with
    /// [`LedgerError::Corrupt`] if storage cannot be resolved to a unique head.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        let guard = WriterGuard::acquire(&path)?;

        let mut ledger = Self {
            path,
            head: None,
            next_index: 0,
            _guard: guard,
        };
        ledger.reconcile()?;
        info!(
            path = %ledger.path.display(),
            next_index = ledger.next_index,
            head = ledger.head.as_deref().unwrap_or("null"),
            "ledger opened"
        );
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash of the last durable record, `None` for an empty ledger.
    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    /// Index the next appended record will receive.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Re-read storage, discard crash debris, and reset head and index.
    fn reconcile(&mut self) -> Result<(), LedgerError> {
        let bytes = read_bytes(&self.path)?;
        let scan = scan_chain(&bytes)?;

        if scan.discarded_bytes > 0 {
            warn!(
                path = %self.path.display(),
                discarded_bytes = scan.discarded_bytes,
                "ledger has an incomplete tail; truncating to last complete record"
            );
            let f = OpenOptions::new()
                .write(true)
                .open(&self.path)
                .map_err(|e| io_err(&self.path, e))?;
            f.set_len(scan.valid_len)
                .map_err(|e| io_err(&self.path, e))?;
            f.sync_all().map_err(|e| io_err(&self.path, e))?;
        }

        let head = scan.head().map(str::to_string);
        let next_index = scan.next_index();
        if head != self.head || next_index != self.next_index {
            if self.head.is_some() || self.next_index > 0 {
                warn!(
                    path = %self.path.display(),
                    cached_index = self.next_index,
                    stored_index = next_index,
                    "ledger head moved on storage; adopting stored head"
                );
            }
            self.head = head;
            self.next_index = next_index;
        }
        Ok(())
    }

    /// Append one record per anomaly, in order.
    ///
    /// Each record is durable before the next is written. On error, records
    /// already returned by earlier calls stay valid and nothing past the
    /// last successful line is trusted.
    pub fn append(&mut self, anomalies: &[Anomaly]) -> Result<Vec<VaultRecord>, LedgerError> {
        self.reconcile()?;
        if anomalies.is_empty() {
            return Ok(Vec::new());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;

        let mut out = Vec::with_capacity(anomalies.len());
        for a in anomalies {
            let index = self.next_index;
            let previous_hash = self.head.clone();
            let hash = record_hash(index, &canonical_payload(a), previous_hash.as_deref())?;

            let record = VaultRecord {
                index,
                timestamp: Utc::now(),
                anomaly_id: a.id.clone(),
                hash,
                previous_hash,
            };

            let mut line = canonical_json(&record.pointer())?;
            line.push('\n');
            file.write_all(line.as_bytes())
                .map_err(|e| io_err(&self.path, e))?;
            file.sync_data().map_err(|e| io_err(&self.path, e))?;

            self.head = Some(record.hash.clone());
            self.next_index = index + 1;
            out.push(record);
        }

        info!(
            path = %self.path.display(),
            appended = out.len(),
            next_index = self.next_index,
            "ledger append"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use sweep_schemas::Severity;

    fn anomaly(id: &str) -> Anomaly {
        Anomaly {
            id: id.to_string(),
            severity: Severity::Medium,
            description: "d".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            score: 0.5,
            metadata: BTreeMap::new(),
            related_entries: vec![id.to_string()],
        }
    }

    #[test]
    fn empty_append_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let mut ledger = IntegrityLedger::open(&path).unwrap();
        assert!(ledger.append(&[]).unwrap().is_empty());
        assert_eq!(ledger.next_index(), 0);
        assert!(ledger.head().is_none());
        assert!(read_bytes(&path).unwrap().is_empty());
    }

    #[test]
    fn lines_are_canonical_pointers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let mut ledger = IntegrityLedger::open(&path).unwrap();
        let recs = ledger.append(&[anomaly("forward-0")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            format!(
                "{{\"anomaly_id\":\"forward-0\",\"hash\":\"{}\",\"index\":0,\"previous_hash\":null}}\n",
                recs[0].hash
            )
        );
    }

    #[test]
    fn append_adopts_head_written_by_previous_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let first = {
            let mut l = IntegrityLedger::open(&path).unwrap();
            l.append(&[anomaly("a")]).unwrap()
        };
        let mut l = IntegrityLedger::open(&path).unwrap();
        let second = l.append(&[anomaly("b")]).unwrap();
        assert_eq!(second[0].index, 1);
        assert_eq!(second[0].previous_hash.as_deref(), Some(first[0].hash.as_str()));
    }

    #[test]
    fn open_refuses_corrupt_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        fs::write(&path, "not json\n").unwrap();
        let err = IntegrityLedger::open(&path).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { line: 1, .. }), "{err}");
    }
}

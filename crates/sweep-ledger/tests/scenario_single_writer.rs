//! Single-writer discipline
//!
//! GREEN when:
//! - A second writer on the same path (even spelled differently) is refused
//!   with LEDGER_BUSY while the first is alive.
//! - Dropping the first writer releases the path.
//! - An open writer holds an OS lock on `<ledger>.lock`, so a separate file
//!   handle (as another process would use) cannot take it; the lock is free
//!   again once the writer drops.
//! - A lock held outside the ledger API makes open fail with LEDGER_BUSY.
//! - Concurrent appends funnelled through one shared writer produce a
//!   contiguous chain with no duplicate indices.

use chrono::Utc;
use std::collections::BTreeMap;
use std::fs::{File, TryLockError};
use std::sync::{Arc, Mutex};
use std::thread;
use sweep_ledger::{
    lock_path, read_pointers, verify_pointers_str, IntegrityLedger, LedgerError, VerifyResult,
};
use sweep_schemas::{Anomaly, Severity};
use uuid::Uuid;

fn anomaly() -> Anomaly {
    Anomaly {
        id: format!("forward-{}", Uuid::new_v4().as_simple()),
        severity: Severity::Low,
        description: "d".to_string(),
        timestamp: Utc::now(),
        score: 0.1,
        metadata: BTreeMap::new(),
        related_entries: vec![],
    }
}

#[test]
fn second_writer_is_busy_until_first_drops() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let alias = dir.path().join(".").join("ledger.jsonl");

    let first = IntegrityLedger::open(&path).unwrap();
    let err = IntegrityLedger::open(&alias).unwrap_err();
    assert!(matches!(err, LedgerError::Busy { .. }), "{err}");
    assert!(err.to_string().starts_with("LEDGER_BUSY"));

    drop(first);
    assert!(IntegrityLedger::open(&alias).is_ok());
}

#[test]
fn open_writer_holds_os_lock_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let lock = lock_path(&dir.path().canonicalize().unwrap().join("ledger.jsonl"));

    let writer = IntegrityLedger::open(&path).unwrap();
    assert!(lock.exists());
    let other = File::options().write(true).open(&lock).unwrap();
    assert!(matches!(other.try_lock(), Err(TryLockError::WouldBlock)));

    drop(writer);
    other.try_lock().unwrap();
    other.unlock().unwrap();
}

#[test]
fn externally_held_lock_refuses_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let lock = lock_path(&dir.path().canonicalize().unwrap().join("ledger.jsonl"));

    let holder = File::create(&lock).unwrap();
    holder.lock().unwrap();
    let err = IntegrityLedger::open(&path).unwrap_err();
    assert!(err.to_string().starts_with("LEDGER_BUSY"), "{err}");
    assert!(!path.exists(), "a refused writer must not touch the ledger");

    holder.unlock().unwrap();
    IntegrityLedger::open(&path).unwrap();
}

#[test]
fn shared_writer_keeps_chain_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let ledger = Arc::new(Mutex::new(IntegrityLedger::open(&path).unwrap()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for _ in 0..5 {
                    ledger.lock().unwrap().append(&[anomaly()]).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stored = read_pointers(&path).unwrap();
    assert_eq!(stored.len(), 20);
    for (i, p) in stored.iter().enumerate() {
        assert_eq!(p.index, i as u64);
    }
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(verify_pointers_str(&text), VerifyResult::Valid { records: 20 });
}

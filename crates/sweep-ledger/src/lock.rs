//! Single-writer discipline for a ledger path.
//!
//! Two layers: an in-process registry keyed by the normalized path, and an
//! advisory OS lock on the sibling `<ledger>.lock` file that excludes writers
//! in other processes. Either one being held yields [`LedgerError::Busy`].

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::error::io_err;
use crate::LedgerError;

static WRITERS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn writers() -> &'static Mutex<HashSet<PathBuf>> {
    WRITERS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Normalized key for `path`. The parent directory must exist.
fn writer_key(path: &Path) -> Result<PathBuf, LedgerError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let parent = parent.canonicalize().map_err(|e| io_err(parent, e))?;
    let name = path.file_name().ok_or_else(|| LedgerError::Io {
        path: path.to_path_buf(),
        message: "ledger path has no file name".to_string(),
    })?;
    Ok(parent.join(name))
}

/// `<ledger>.lock`, next to the ledger.
pub fn lock_path(ledger: &Path) -> PathBuf {
    let mut s = OsString::from(ledger.as_os_str());
    s.push(".lock");
    PathBuf::from(s)
}

fn os_lock(key: &Path) -> Result<File, LedgerError> {
    let path = lock_path(key);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|e| io_err(&path, e))?;
    match file.try_lock() {
        Ok(()) => Ok(file),
        Err(TryLockError::WouldBlock) => Err(LedgerError::Busy {
            path: key.to_path_buf(),
        }),
        Err(TryLockError::Error(e)) => Err(io_err(&path, e)),
    }
}

#[derive(Debug)]
pub(crate) struct WriterGuard {
    key: PathBuf,
    file: File,
}

impl WriterGuard {
    pub(crate) fn acquire(path: &Path) -> Result<Self, LedgerError> {
        let key = writer_key(path)?;
        let mut held = writers().lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(key.clone()) {
            return Err(LedgerError::Busy { path: key });
        }
        match os_lock(&key) {
            Ok(file) => Ok(Self { key, file }),
            Err(e) => {
                held.remove(&key);
                Err(e)
            }
        }
    }
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        let mut held = writers().lock().unwrap_or_else(|e| e.into_inner());
        let _ = self.file.unlock();
        held.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_file_sits_next_to_ledger() {
        assert_eq!(
            lock_path(Path::new("/var/lib/sweep/vault.jsonl")),
            PathBuf::from("/var/lib/sweep/vault.jsonl.lock")
        );
    }

    #[test]
    fn foreign_lock_holder_makes_acquire_busy() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("ledger.jsonl");
        let key = writer_key(&ledger).unwrap();

        let foreign = File::create(lock_path(&key)).unwrap();
        foreign.lock().unwrap();
        let err = WriterGuard::acquire(&ledger).unwrap_err();
        assert!(matches!(err, LedgerError::Busy { .. }), "{err}");

        foreign.unlock().unwrap();
        let guard = WriterGuard::acquire(&ledger).unwrap();
        drop(guard);
        WriterGuard::acquire(&ledger).unwrap();
    }
}

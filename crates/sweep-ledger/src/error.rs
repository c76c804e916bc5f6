use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum LedgerError {
    /// Filesystem failure on the ledger file.
    Io { path: PathBuf, message: String },
    /// A record could not be serialized canonically.
    Serialize(String),
    /// Storage holds a state the reader cannot resolve without guessing a head
    /// (a terminated but unparsable line, a broken link, a gap in indices).
    /// `line` is 1-based.
    Corrupt { line: usize, reason: String },
    /// Another writer, in this process or another, already holds the ledger
    /// path.
    Busy { path: PathBuf },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Io { path, message } => {
                write!(f, "LEDGER_IO path={}: {message}", path.display())
            }
            LedgerError::Serialize(msg) => write!(f, "LEDGER_SERIALIZE: {msg}"),
            LedgerError::Corrupt { line, reason } => {
                write!(f, "LEDGER_CORRUPT line={line}: {reason}")
            }
            LedgerError::Busy { path } => write!(
                f,
                "LEDGER_BUSY path={}: another writer holds this ledger",
                path.display()
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

pub(crate) fn io_err(path: impl Into<PathBuf>, e: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.into(),
        message: e.to_string(),
    }
}

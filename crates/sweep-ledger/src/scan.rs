//! Reading the chain back from storage.
//!
//! Only newline-terminated lines are records. An unterminated tail, and any
//! run of blank (whitespace / NUL) lines after the last record, are crash
//! debris: they are reported as discardable and never become the head.
//! Anything else that does not parse or link is corruption, and the reader
//! refuses to pick a head.

use sweep_schemas::LedgerPointer;

use crate::canonical::is_hash;
use crate::LedgerError;

/// Result of scanning ledger bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainScan {
    pub pointers: Vec<LedgerPointer>,
    /// Byte length of the trusted prefix.
    pub valid_len: u64,
    /// Trailing bytes past `valid_len` that must be discarded.
    pub discarded_bytes: u64,
}

impl ChainScan {
    pub fn head(&self) -> Option<&str> {
        self.pointers.last().map(|p| p.hash.as_str())
    }

    pub fn next_index(&self) -> u64 {
        self.pointers.len() as u64
    }
}

fn is_blank(content: &[u8]) -> bool {
    content
        .iter()
        .all(|b| b.is_ascii_whitespace() || *b == 0)
}

/// Check that `p` is the link expected after `prev`.
pub fn check_link(p: &LedgerPointer, prev: Option<&LedgerPointer>) -> Result<(), String> {
    let expected_index = prev.map(|r| r.index + 1).unwrap_or(0);
    if p.index != expected_index {
        return Err(format!(
            "index gap: expected {expected_index}, got {}",
            p.index
        ));
    }
    let expected_prev = prev.map(|r| r.hash.as_str());
    if p.previous_hash.as_deref() != expected_prev {
        return Err(format!(
            "previous_hash mismatch: expected {:?}, got {:?}",
            expected_prev, p.previous_hash
        ));
    }
    if !is_hash(&p.hash) {
        return Err("hash is not 64 lowercase hex chars".to_string());
    }
    Ok(())
}

/// Scan raw ledger bytes into a linked pointer list plus a discard plan.
pub fn scan_chain(bytes: &[u8]) -> Result<ChainScan, LedgerError> {
    let complete_len = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut pointers: Vec<LedgerPointer> = Vec::new();
    let mut valid_len = 0usize;
    let mut offset = 0usize;
    let mut first_blank: Option<usize> = None;

    for (i, raw_line) in bytes[..complete_len]
        .split_inclusive(|b| *b == b'\n')
        .enumerate()
    {
        let line_no = i + 1;
        let end = offset + raw_line.len();
        offset = end;
        let content = &raw_line[..raw_line.len() - 1];

        if is_blank(content) {
            first_blank.get_or_insert(line_no);
            continue;
        }
        if let Some(blank) = first_blank {
            return Err(LedgerError::Corrupt {
                line: blank,
                reason: "blank line inside the chain".to_string(),
            });
        }

        let text = std::str::from_utf8(content).map_err(|_| LedgerError::Corrupt {
            line: line_no,
            reason: "record is not UTF-8".to_string(),
        })?;
        let p: LedgerPointer =
            serde_json::from_str(text.trim()).map_err(|e| LedgerError::Corrupt {
                line: line_no,
                reason: format!("unparsable record: {e}"),
            })?;
        check_link(&p, pointers.last()).map_err(|reason| LedgerError::Corrupt {
            line: line_no,
            reason,
        })?;

        pointers.push(p);
        valid_len = end;
    }

    Ok(ChainScan {
        pointers,
        valid_len: valid_len as u64,
        discarded_bytes: (bytes.len() - valid_len) as u64,
    })
}

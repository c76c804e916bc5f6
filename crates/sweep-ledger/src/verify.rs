//! Offline verification.
//!
//! The ledger alone proves linkage. Recomputing hashes needs the payloads,
//! which live in the sink stream. Each sink payload is matched to its ledger
//! record by anomaly id and recomputed hash, so a payload is never judged
//! against a neighbour's record.

use std::fs;
use std::path::Path;

use sweep_schemas::{Anomaly, LedgerPointer};

use crate::canonical::{canonical_payload, record_hash};
use crate::error::io_err;
use crate::scan::check_link;
use crate::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// Every ledger record links and every hash recomputes.
    Valid { records: usize },
    /// The chain is broken at `index`.
    Broken { index: u64, reason: String },
    /// Links hold, but only the first `verified` records had payloads to
    /// recompute against.
    Incomplete { verified: usize, ledger_records: usize },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid { .. })
    }
}

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c.is_ascii_whitespace() || c == '\0')
}

/// Newline-terminated record lines, read under the same rules as the writer's
/// recovery scan: an unterminated last fragment and a run of blank or NUL
/// lines at the end are crash debris and are ignored. A blank line followed
/// by a record fails with the number of records before it.
fn record_lines(content: &str) -> Result<Vec<&str>, usize> {
    let end = content.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let mut out = Vec::new();
    let mut blank_seen = false;
    for line in content[..end].lines() {
        if is_blank(line) {
            blank_seen = true;
            continue;
        }
        if blank_seen {
            return Err(out.len());
        }
        out.push(line.trim());
    }
    Ok(out)
}

fn parse_pointers(ledger: &str) -> Result<Vec<LedgerPointer>, VerifyResult> {
    let lines = record_lines(ledger).map_err(|records| VerifyResult::Broken {
        index: records as u64,
        reason: "blank line inside the chain".to_string(),
    })?;
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        match serde_json::from_str::<LedgerPointer>(line) {
            Ok(p) => out.push(p),
            Err(e) => {
                return Err(VerifyResult::Broken {
                    index: out.len() as u64,
                    reason: format!("unparsable ledger record: {e}"),
                })
            }
        }
    }
    Ok(out)
}

fn parse_anomalies(sink: &str) -> Result<Vec<Anomaly>, VerifyResult> {
    let lines = record_lines(sink).map_err(|records| VerifyResult::Broken {
        index: records as u64,
        reason: "blank line inside the sink stream".to_string(),
    })?;
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        match serde_json::from_str::<Anomaly>(line) {
            Ok(a) => out.push(a),
            Err(e) => {
                return Err(VerifyResult::Broken {
                    index: out.len() as u64,
                    reason: format!("unparsable sink record: {e}"),
                })
            }
        }
    }
    Ok(out)
}

fn check_links(pointers: &[LedgerPointer]) -> Option<VerifyResult> {
    let mut prev: Option<&LedgerPointer> = None;
    for (i, p) in pointers.iter().enumerate() {
        if let Err(reason) = check_link(p, prev) {
            return Some(VerifyResult::Broken {
                index: i as u64,
                reason,
            });
        }
        prev = Some(p);
    }
    None
}

/// Linkage only: indices contiguous from 0, genesis `previous_hash` null,
/// every other `previous_hash` equal to the prior hash.
pub fn verify_pointers_str(ledger: &str) -> VerifyResult {
    let pointers = match parse_pointers(ledger) {
        Ok(p) => p,
        Err(broken) => return broken,
    };
    check_links(&pointers).unwrap_or(VerifyResult::Valid {
        records: pointers.len(),
    })
}

/// First record at or after `from` whose id and hash both match `a`.
fn find_record(
    pointers: &[LedgerPointer],
    from: usize,
    a: &Anomaly,
) -> Result<Option<usize>, LedgerError> {
    let payload = canonical_payload(a);
    for (j, p) in pointers.iter().enumerate().skip(from) {
        if p.anomaly_id != a.id {
            continue;
        }
        if record_hash(p.index, &payload, p.previous_hash.as_deref())? == p.hash {
            return Ok(Some(j));
        }
    }
    Ok(None)
}

/// Explain why sink record `a` has no ledger record at or after `cursor`.
fn unmatched(
    pointers: &[LedgerPointer],
    anomalies: &[Anomaly],
    cursor: usize,
    a: &Anomaly,
) -> Result<VerifyResult, LedgerError> {
    let Some(p) = pointers.get(cursor) else {
        return Ok(VerifyResult::Broken {
            index: pointers.len() as u64,
            reason: format!(
                "sink has {} records but ledger has {}",
                anomalies.len(),
                pointers.len()
            ),
        });
    };
    if p.anomaly_id != a.id {
        return Ok(VerifyResult::Broken {
            index: p.index,
            reason: format!(
                "anomaly_id mismatch: ledger {:?}, sink {:?}",
                p.anomaly_id, a.id
            ),
        });
    }
    let recomputed = record_hash(p.index, &canonical_payload(a), p.previous_hash.as_deref())?;
    Ok(VerifyResult::Broken {
        index: p.index,
        reason: format!("hash mismatch: stored {}, recomputed {}", p.hash, recomputed),
    })
}

/// Linkage plus hash recomputation against already-parsed inputs.
///
/// Sink payloads must cover a prefix of the ledger. A payload that belongs
/// to a later record than expected means the payloads in between are gone,
/// which is reported as `Broken` at the first record left without one. A
/// sink that simply stops early is `Incomplete`.
pub fn verify_records(
    pointers: &[LedgerPointer],
    anomalies: &[Anomaly],
) -> Result<VerifyResult, LedgerError> {
    if let Some(broken) = check_links(pointers) {
        return Ok(broken);
    }

    let mut cursor = 0usize;
    for (pos, a) in anomalies.iter().enumerate() {
        let Some(found) = find_record(pointers, cursor, a)? else {
            return unmatched(pointers, anomalies, cursor, a);
        };
        if found != cursor {
            return Ok(VerifyResult::Broken {
                index: pointers[cursor].index,
                reason: format!(
                    "sink has no payload for ledger record {}; sink record {pos} ({}) belongs to record {}",
                    pointers[cursor].index, a.id, pointers[found].index
                ),
            });
        }
        cursor += 1;
    }

    if cursor < pointers.len() {
        return Ok(VerifyResult::Incomplete {
            verified: cursor,
            ledger_records: pointers.len(),
        });
    }
    Ok(VerifyResult::Valid {
        records: pointers.len(),
    })
}

/// Verify ledger JSONL against sink JSONL held in memory.
pub fn verify_chain_str(ledger: &str, sink: &str) -> Result<VerifyResult, LedgerError> {
    let pointers = match parse_pointers(ledger) {
        Ok(p) => p,
        Err(broken) => return Ok(broken),
    };
    let anomalies = match parse_anomalies(sink) {
        Ok(a) => a,
        Err(broken) => return Ok(broken),
    };
    verify_records(&pointers, &anomalies)
}

/// Verify the files at `ledger_path` and `sink_path`. A missing sink file
/// counts as an empty stream.
pub fn verify_chain(
    ledger_path: impl AsRef<Path>,
    sink_path: impl AsRef<Path>,
) -> Result<VerifyResult, LedgerError> {
    let ledger_path = ledger_path.as_ref();
    let sink_path = sink_path.as_ref();
    let ledger = fs::read_to_string(ledger_path).map_err(|e| io_err(ledger_path, e))?;
    let sink = match fs::read_to_string(sink_path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_err(sink_path, e)),
    };
    verify_chain_str(&ledger, &sink)
}

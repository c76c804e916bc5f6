//! Deduplicating merge.
//!
//! Key: `(description, sorted(related_entries))`. First occurrence wins;
//! later duplicates are dropped even when their severity or score differs.
//! Scope is a single call, never across cycles (see [`crate::SeenStore`]).

use std::collections::HashSet;
use sweep_schemas::Anomaly;

/// Forward items first, in order, then reverse items not already seen.
pub fn merge(forward: Vec<Anomaly>, reverse: Vec<Anomaly>) -> Vec<Anomaly> {
    merge_all([forward, reverse])
}

/// Concatenate any number of detector outputs in group order, dropping
/// repeated signatures. Linear in the total anomaly count.
pub fn merge_all<I>(groups: I) -> Vec<Anomaly>
where
    I: IntoIterator<Item = Vec<Anomaly>>,
{
    let mut merged: Vec<Anomaly> = Vec::new();
    let mut seen: HashSet<(String, Vec<String>)> = HashSet::new();

    for group in groups {
        for a in group {
            if seen.insert(a.signature()) {
                merged.push(a);
            }
        }
    }
    merged
}

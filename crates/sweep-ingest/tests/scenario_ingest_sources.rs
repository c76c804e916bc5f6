//! Ingestion over real files.
//!
//! GREEN when:
//! - Sources are read in the order given, lines in file order.
//! - A missing source is skipped and reported, never an error.
//! - Blank lines are dropped; invalid UTF-8 is replaced, not rejected.
//! - The window filter drops entries whose age exceeds the window.
//! - The window reference is read once per pass, after every line is parsed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::Cell;
use std::fs;
use sweep_ingest::Ingestor;

fn fixed(ts: DateTime<Utc>) -> impl Fn() -> DateTime<Utc> {
    move || ts
}

#[test]
fn sources_processed_in_order_and_missing_ones_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let auth = dir.path().join("auth.log");
    let sys = dir.path().join("syslog");
    let missing = dir.path().join("missing.log");
    fs::write(&auth, "a1\na2\n").unwrap();
    fs::write(&sys, "s1\n\n   \ns2").unwrap();

    let ingestor = Ingestor::new(vec![sys.clone(), missing.clone(), auth.clone()], 60);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let report = ingestor.collect_with_clock(fixed(now));

    let raws: Vec<&str> = report.entries.iter().map(|e| e.raw.as_str()).collect();
    assert_eq!(raws, vec!["s1", "s2", "a1", "a2"]);
    assert_eq!(report.entries[0].source, sys.display().to_string());
    assert_eq!(report.entries[2].source, auth.display().to_string());
    assert!(report.entries.iter().all(|e| e.timestamp == now));

    assert_eq!(report.skipped_sources.len(), 1);
    assert_eq!(report.skipped_sources[0].source, missing.display().to_string());
    assert_eq!(report.out_of_window, 0);
}

#[test]
fn invalid_utf8_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bin.log");
    fs::write(&path, b"ok line\nbad \xff\xfe byte\n").unwrap();

    let report = Ingestor::new(vec![path], 60).collect();
    assert_eq!(report.entries.len(), 2);
    assert!(report.entries[1].raw.starts_with("bad "));
    assert!(report.entries[1].raw.contains('\u{FFFD}'));
}

#[test]
fn directory_source_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let report = Ingestor::new(vec![dir.path().to_path_buf()], 60).collect();
    assert!(report.entries.is_empty());
    assert_eq!(report.skipped_sources.len(), 1);
}

#[test]
fn window_reference_is_read_once_after_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth.log");
    fs::write(&path, "l1\nl2\nl3\n").unwrap();

    // Each clock read advances six minutes: lines are stamped at 0, 6 and 12,
    // and the single reference read lands at 18. Ages are 18, 12 and 6.
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let ticks = Cell::new(0i64);
    let clock = || {
        let n = ticks.get();
        ticks.set(n + 1);
        start + Duration::minutes(6 * n)
    };

    let report = Ingestor::new(vec![path.clone()], 5).collect_with_clock(clock);
    assert!(report.entries.is_empty());
    assert_eq!(report.out_of_window, 3);
    assert_eq!(ticks.get(), 4, "three parse reads plus one reference read");

    ticks.set(0);
    let report = Ingestor::new(vec![path], 12).collect_with_clock(|| {
        let n = ticks.get();
        ticks.set(n + 1);
        start + Duration::minutes(6 * n)
    });
    let raws: Vec<&str> = report.entries.iter().map(|e| e.raw.as_str()).collect();
    assert_eq!(raws, vec!["l2", "l3"], "age == window is inclusive");
    assert_eq!(report.out_of_window, 1);
}

#[test]
fn wall_clock_keeps_fresh_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth.log");
    fs::write(&path, "sudo su\n").unwrap();
    let report = Ingestor::new(vec![path], 1).collect();
    assert_eq!(report.entries.len(), 1);
}

//! Command handlers for the `sweep` binary.

pub mod cycle;
pub mod watch;

use anyhow::{Context, Result};
use sweep_config::LoadedConfig;
use sweep_ledger::VerifyResult;
use sweep_runtime::CycleReport;

pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    sweep_config::load_layered_yaml(&path_refs).context("load config failed")
}

pub fn print_report(r: &CycleReport) {
    println!("cycle_id={}", r.cycle_id);
    println!("entries_processed={}", r.entries_processed);
    println!("skipped_sources={}", r.skipped_sources.len());
    for s in &r.skipped_sources {
        println!("skipped_source={} reason={}", s.source, s.reason);
    }
    println!("anomalies_detected={}", r.anomalies_detected);
    println!("anomalies_suppressed={}", r.anomalies_suppressed);
    println!("anomalies_ledgered={}", r.anomalies_ledgered);
    println!("head={}", r.head.as_deref().unwrap_or("null"));
    println!("next_index={}", r.next_index);
    println!("anchor={}", r.anchor.status());
}

pub fn verify(ledger: &str, sink: &str) -> Result<()> {
    match sweep_ledger::verify_chain(ledger, sink).context("verify failed")? {
        VerifyResult::Valid { records } => {
            println!("status=valid records={records}");
            Ok(())
        }
        VerifyResult::Incomplete {
            verified,
            ledger_records,
        } => {
            println!("status=incomplete verified={verified} ledger_records={ledger_records}");
            Ok(())
        }
        VerifyResult::Broken { index, reason } => {
            println!("status=broken index={index}");
            anyhow::bail!("CHAIN_BROKEN at index {index}: {reason}")
        }
    }
}

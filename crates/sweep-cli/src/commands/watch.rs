use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::cycle::build_pipeline;
use super::{load_config, print_report};

/// Periodic trigger. Ctrl-C is honoured between cycles, never mid-cycle.
/// A failed cycle is logged and the next tick runs normally.
pub async fn run(config_paths: &[String], max_cycles: Option<u64>) -> Result<()> {
    let loaded = load_config(config_paths)?;
    let interval_secs = loaded.config.schedule.interval_secs;
    let mut pipeline = build_pipeline(&loaded)?;

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut completed = 0u64;
    info!(interval_secs, "watch started");
    loop {
        if max_cycles.is_some_and(|max| completed >= max) {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; stopping watch");
                break;
            }
            _ = ticker.tick() => {
                match pipeline.run_cycle().await {
                    Ok(report) => print_report(&report),
                    Err(e) => error!(error = %format!("{e:#}"), "cycle failed"),
                }
                completed += 1;
            }
        }
    }
    info!(cycles = completed, "watch stopped");
    Ok(())
}

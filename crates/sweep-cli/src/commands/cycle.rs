use anyhow::Result;
use sweep_config::{resolve_anchor_secret, LoadedConfig};
use sweep_runtime::Pipeline;
use tracing::info;

use super::{load_config, print_report};

/// Build a pipeline from loaded config. Secrets are resolved here, once.
pub fn build_pipeline(loaded: &LoadedConfig) -> Result<Pipeline> {
    let secret = resolve_anchor_secret(&loaded.config.anchor);
    info!(config_hash = %loaded.config_hash, "config loaded");
    Pipeline::from_config(&loaded.config, &secret)
}

pub async fn run_once(config_paths: &[String]) -> Result<()> {
    let loaded = load_config(config_paths)?;
    let mut pipeline = build_pipeline(&loaded)?;
    let report = pipeline.run_cycle().await?;
    print_report(&report);
    Ok(())
}

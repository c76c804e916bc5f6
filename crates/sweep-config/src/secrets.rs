//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"SWEEP_ANCHOR_API_KEY"`).
//! - The binary calls [`resolve_anchor_secret`] once at startup and hands the
//!   result to the anchor publisher; nothing else reads the environment.
//! - `Debug` output redacts values.
//!
//! A missing key is not an error: the anchor step reports `skipped`.

use crate::AnchorConfig;

/// Relay credential resolved from the environment.
#[derive(Clone, Default)]
pub struct AnchorSecret {
    /// `None` if the named env var was absent or blank.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AnchorSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorSecret")
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Resolve a named environment variable.
/// Returns `None` if the variable is unset or its value is blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name.trim()) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve the relay API key named by `anchor.api_key_env`.
///
/// Returns an empty secret when anchoring is disabled so the key never enters
/// process memory needlessly.
pub fn resolve_anchor_secret(cfg: &AnchorConfig) -> AnchorSecret {
    if !cfg.enabled {
        return AnchorSecret::default();
    }
    AnchorSecret {
        api_key: resolve_env(&cfg.api_key_env),
    }
}

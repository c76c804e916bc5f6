//! Best-effort external notarization of ledger heads.
//!
//! Anchoring never fails a cycle: every transport or relay problem comes
//! back as [`AnchorOutcome::Error`], and it is attempted at most once per
//! batch. Local chain integrity does not depend on it.

use std::time::Duration;

use serde::Serialize;
use sweep_schemas::VaultRecord;
use tracing::{info, warn};

/// Classified result of one anchor attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnchorOutcome {
    /// Relay accepted the batch; `response` is its raw body.
    Ok { response: String },
    /// Nothing was sent.
    Skipped { reason: String },
    Error { error: String },
}

impl AnchorOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            AnchorOutcome::Ok { .. } => "ok",
            AnchorOutcome::Skipped { .. } => "skipped",
            AnchorOutcome::Error { .. } => "error",
        }
    }
}

/// Pluggable notarization backend.
#[async_trait::async_trait]
pub trait ChainAnchor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn anchor(&self, records: &[VaultRecord]) -> AnchorOutcome;
}

#[derive(Debug, Serialize)]
struct AnchorRecord<'a> {
    index: u64,
    hash: &'a str,
    previous_hash: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct AnchorRequest<'a> {
    api_key: &'a str,
    records: Vec<AnchorRecord<'a>>,
}

/// HTTP relay: `POST {api_key, records: [{index, hash, previous_hash}]}`.
///
/// The API key is never logged.
#[derive(Clone)]
pub struct RelayAnchor {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
}

impl std::fmt::Debug for RelayAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayAnchor")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RelayAnchor {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            timeout,
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl ChainAnchor for RelayAnchor {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn anchor(&self, records: &[VaultRecord]) -> AnchorOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            info!(endpoint = %self.endpoint, "anchor skipped: no api key");
            return AnchorOutcome::Skipped {
                reason: "no api key configured".to_string(),
            };
        };
        if records.is_empty() {
            return AnchorOutcome::Skipped {
                reason: "no new records".to_string(),
            };
        }

        let body = AnchorRequest {
            api_key,
            records: records
                .iter()
                .map(|r| AnchorRecord {
                    index: r.index,
                    hash: &r.hash,
                    previous_hash: r.previous_hash.as_deref(),
                })
                .collect(),
        };

        let resp = match self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(
                    endpoint = %self.endpoint,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "anchor timed out"
                );
                return AnchorOutcome::Error {
                    error: format!("relay timeout after {}ms: {e}", self.timeout.as_millis()),
                };
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "anchor request failed");
                return AnchorOutcome::Error {
                    error: e.to_string(),
                };
            }
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "anchor response unreadable");
                return AnchorOutcome::Error {
                    error: e.to_string(),
                };
            }
        };

        if !status.is_success() {
            warn!(endpoint = %self.endpoint, status = status.as_u16(), "anchor rejected");
            return AnchorOutcome::Error {
                error: format!("relay http error status={}: {}", status.as_u16(), text),
            };
        }

        info!(
            endpoint = %self.endpoint,
            records = records.len(),
            "anchor accepted"
        );
        AnchorOutcome::Ok { response: text }
    }
}

//! sweep-runtime
//!
//! One pipeline cycle: ingest -> detect -> merge -> (seen filter) -> ledger
//! -> (seen record) -> sink -> (anchor). The caller owns scheduling; nothing
//! here loops.
//!
//! Sink line `i` carries the payload of ledger record `i`. A batch stays
//! pending in memory from its ledger commit until the sink holds it, and is
//! replayed at the start of the next cycle if the sink write failed.
//!
//! Partial failures (unreadable sources, anchor trouble) end up in the
//! [`CycleReport`]. Only configuration, ledger, sink and seen-store failures
//! abort a cycle.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use sweep_anchor::{AnchorOutcome, ChainAnchor, RelayAnchor};
use sweep_config::{AnchorSecret, SweepConfig};
use sweep_detect::{default_detectors, merge_all, Detector, SeenStore};
use sweep_ingest::{Ingestor, SkippedSource};
use sweep_ledger::IntegrityLedger;
use sweep_schemas::Anomaly;
use sweep_sink::Sink;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Anchor column of a [`CycleReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorStatus {
    /// No anchor configured.
    Disabled,
    Attempted(AnchorOutcome),
}

impl AnchorStatus {
    pub fn status(&self) -> &'static str {
        match self {
            AnchorStatus::Disabled => "disabled",
            AnchorStatus::Attempted(o) => o.status(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub entries_processed: usize,
    pub skipped_sources: Vec<SkippedSource>,
    /// Sum over detectors, before merge.
    pub anomalies_detected: usize,
    /// Dropped because a previous cycle already ledgered the same signature.
    pub anomalies_suppressed: usize,
    pub anomalies_ledgered: usize,
    /// Chain head after this cycle.
    pub head: Option<String>,
    pub next_index: u64,
    pub anchor: AnchorStatus,
}

pub struct Pipeline {
    ingestor: Ingestor,
    detectors: Vec<Box<dyn Detector>>,
    ledger: IntegrityLedger,
    sink: Sink,
    /// Ledgered payloads not yet confirmed in the sink.
    pending_sink: Vec<Anomaly>,
    seen: Option<SeenStore>,
    anchor: Option<Box<dyn ChainAnchor>>,
}

impl Pipeline {
    /// Wire a pipeline from validated config. Opens (and recovers) the ledger,
    /// the sink and the seen store. Fails if another pipeline holds the
    /// ledger, or if the sink does not hold exactly one payload per ledger
    /// record (a crash between the two writes loses the payloads).
    pub fn from_config(cfg: &SweepConfig, secret: &AnchorSecret) -> Result<Self> {
        cfg.validate().context("invalid sweep config")?;

        let ledger = IntegrityLedger::open(&cfg.ledger.path)
            .with_context(|| format!("open ledger {}", cfg.ledger.path.display()))?;

        let sink = Sink::new(cfg.sink.path.clone());
        sink.align(ledger.next_index(), &[]).with_context(|| {
            format!(
                "sink {} does not match ledger {}",
                cfg.sink.path.display(),
                cfg.ledger.path.display()
            )
        })?;

        let seen = match &cfg.dedupe.seen_path {
            Some(p) => Some(
                SeenStore::open(p)
                    .with_context(|| format!("open seen store {}", p.display()))?,
            ),
            None => None,
        };

        let anchor: Option<Box<dyn ChainAnchor>> = match &cfg.anchor.endpoint {
            Some(endpoint) if cfg.anchor.enabled => Some(Box::new(RelayAnchor::new(
                endpoint.clone(),
                secret.api_key.clone(),
                Duration::from_secs(cfg.anchor.timeout_secs),
            ))),
            _ => None,
        };

        Ok(Self {
            ingestor: Ingestor::new(cfg.ingest.sources.clone(), cfg.ingest.window_minutes),
            detectors: default_detectors(),
            ledger,
            sink,
            pending_sink: Vec::new(),
            seen,
            anchor,
        })
    }

    /// Replace the detector set. Merge order follows `detectors` order.
    pub fn with_detectors(mut self, detectors: Vec<Box<dyn Detector>>) -> Self {
        self.detectors = detectors;
        self
    }

    /// Replace (or remove) the anchor backend.
    pub fn with_anchor(mut self, anchor: Option<Box<dyn ChainAnchor>>) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn ledger(&self) -> &IntegrityLedger {
        &self.ledger
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", cycle_id = %cycle_id);
        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    /// Write whatever part of the pending batch the sink is missing.
    fn flush_sink(&mut self) -> Result<()> {
        self.sink
            .align(self.ledger.next_index(), &self.pending_sink)
            .context("sink write")?;
        self.pending_sink.clear();
        Ok(())
    }

    async fn run_cycle_inner(&mut self, cycle_id: Uuid) -> Result<CycleReport> {
        if !self.pending_sink.is_empty() {
            warn!(
                pending = self.pending_sink.len(),
                "replaying sink payloads left by a failed cycle"
            );
            self.flush_sink()?;
        }

        let ingest = self.ingestor.collect();
        let entries = ingest.entries;

        let detected_at = Utc::now();
        let groups: Vec<_> = self
            .detectors
            .iter()
            .map(|d| {
                let found = d.detect(&entries, detected_at);
                info!(detector = d.name(), found = found.len(), "detector pass");
                found
            })
            .collect();
        let anomalies_detected = groups.iter().map(Vec::len).sum();
        let merged = merge_all(groups);

        let (batch, anomalies_suppressed) = match &self.seen {
            Some(store) => {
                let (fresh, dup) = store.partition(merged);
                if !dup.is_empty() {
                    warn!(suppressed = dup.len(), "anomalies already ledgered by an earlier cycle");
                }
                (fresh, dup.len())
            }
            None => (merged, 0),
        };

        let anchor = if batch.is_empty() {
            match self.anchor {
                Some(_) => AnchorStatus::Attempted(AnchorOutcome::Skipped {
                    reason: "no new records".to_string(),
                }),
                None => AnchorStatus::Disabled,
            }
        } else {
            let start = self.ledger.next_index();
            let records = match self.ledger.append(&batch) {
                Ok(records) => records,
                Err(e) => {
                    // Records synced before the failure are committed and
                    // still owe the sink their payloads.
                    let committed = self.ledger.next_index().saturating_sub(start) as usize;
                    self.pending_sink = batch[..committed.min(batch.len())].to_vec();
                    return Err(anyhow::Error::new(e).context("ledger append"));
                }
            };
            self.pending_sink = batch.clone();
            if let Some(store) = self.seen.as_mut() {
                store.record(&batch).context("seen store record")?;
            }
            self.flush_sink()?;
            match &self.anchor {
                Some(a) => AnchorStatus::Attempted(a.anchor(&records).await),
                None => AnchorStatus::Disabled,
            }
        };

        let report = CycleReport {
            cycle_id,
            entries_processed: entries.len(),
            skipped_sources: ingest.skipped_sources,
            anomalies_detected,
            anomalies_suppressed,
            anomalies_ledgered: batch.len(),
            head: self.ledger.head().map(str::to_string),
            next_index: self.ledger.next_index(),
            anchor,
        };
        info!(
            entries = report.entries_processed,
            skipped_sources = report.skipped_sources.len(),
            detected = report.anomalies_detected,
            suppressed = report.anomalies_suppressed,
            ledgered = report.anomalies_ledgered,
            anchor = report.anchor.status(),
            "cycle complete"
        );
        Ok(report)
    }
}

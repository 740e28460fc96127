//! Scrape orchestrator for running extensions in sequence.
//!
//! Extensions run strictly one at a time, in registry order. Cancellation is
//! cooperative and only checked between extensions.

use crate::error::ScrapeError;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trackhound_core::{CutoffDate, ExtensionId};
use trackhound_extension::{Event, EventSender, ExtensionRecord, RunOutcome, ScrapeContext};
use trackhound_gateway::Gateway;

/// Result of running a single extension.
#[derive(Debug, Clone)]
pub struct ExtensionRunResult {
    /// Extension that ran
    pub id: ExtensionId,
    /// Number of results it emitted
    pub results_count: usize,
    /// Why it failed, if it did
    pub error: Option<ScrapeError>,
}

/// Totals of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Per-extension results, in execution order
    pub extensions: Vec<ExtensionRunResult>,
    /// How the run ended
    pub outcome: RunOutcome,
}

impl RunSummary {
    /// Number of extensions whose entry point was invoked.
    #[must_use]
    pub fn executed(&self) -> usize {
        self.extensions.len()
    }

    /// Number of extensions that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.extensions.iter().filter(|r| r.error.is_some()).count()
    }

    /// Total results emitted.
    #[must_use]
    pub fn results(&self) -> usize {
        self.extensions.iter().map(|r| r.results_count).sum()
    }
}

/// Runs the enabled extensions of a registry snapshot.
pub struct ScrapeOrchestrator {
    gateway: Arc<Gateway>,
    events: EventSender,
    cancel: CancellationToken,
    exclusions: Arc<[String]>,
}

impl ScrapeOrchestrator {
    /// Create an orchestrator sharing `gateway` across all extensions.
    #[must_use]
    pub fn new(gateway: Arc<Gateway>, events: EventSender) -> Self {
        Self {
            gateway,
            events,
            cancel: CancellationToken::new(),
            exclusions: Arc::from(Vec::new()),
        }
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Exclusion terms handed to every extension. Stored lowercase.
    #[must_use]
    pub fn with_exclusions(mut self, terms: Vec<String>) -> Self {
        self.exclusions = terms.into_iter().map(|t| t.to_lowercase()).collect();
        self
    }

    /// A handle that cancels this orchestrator's runs.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request that the current run stop before its next extension.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run every enabled record in order.
    ///
    /// Always ends by sending `RunFinished`, also when cancelled or when
    /// there is nothing to run.
    pub async fn run(&self, records: Vec<ExtensionRecord>, cutoff: CutoffDate) -> RunSummary {
        info!(
            count = records.len(),
            cutoff = %cutoff,
            "starting scrape run"
        );

        let mut extensions = Vec::new();
        let mut outcome = RunOutcome::Completed;

        for record in &records {
            if !record.enabled {
                continue;
            }

            if self.cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                self.events.log("Scrape cancelled.");
                break;
            }

            extensions.push(self.run_extension(record, cutoff).await);
        }

        let summary = RunSummary {
            extensions,
            outcome,
        };

        info!(
            executed = summary.executed(),
            failed = summary.failed(),
            results = summary.results(),
            outcome = ?outcome,
            "scrape run finished"
        );

        self.events.send(Event::RunFinished { outcome });
        summary
    }

    async fn run_extension(&self, record: &ExtensionRecord, cutoff: CutoffDate) -> ExtensionRunResult {
        self.events.log(format!("Running {}...", record.name));
        debug!(extension = %record.id, "invoking entry point");

        let ctx = ScrapeContext::new(
            record.id.clone(),
            self.events.clone(),
            self.gateway.clone(),
            cutoff,
            self.exclusions.clone(),
        );

        let error = match record.module().entry_point() {
            Some(entry_point) => {
                match AssertUnwindSafe(entry_point.scrape(&ctx, record))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(ScrapeError::Failed {
                        message: format!("{e:#}"),
                    }),
                    Err(payload) => Some(ScrapeError::from_panic(payload.as_ref())),
                }
            }
            None => Some(ScrapeError::MissingEntryPoint),
        };

        if let Some(e) = &error {
            warn!(extension = %record.id, error = %e, "extension failed");
            self.events
                .log(format!("Error in extension {}: {e}", record.id));
        }

        ExtensionRunResult {
            id: record.id.clone(),
            results_count: ctx.emitted(),
            error,
        }
    }
}

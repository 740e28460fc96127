//! The consumer side of discovery and scraping.
//!
//! The controller owns the registry, the cutoff and the configuration. It
//! starts at most one background worker at a time and applies the events the
//! worker sends back, in order.

use crate::error::{AppError, Result};
use chrono::NaiveDate;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trackhound_core::{AppConfig, CutoffDate, ExtensionId};
use trackhound_extension::{
    events, Discovery, Event, EventReceiver, EventSender, ExtensionLoader, ExtensionRegistry,
    RecipeLoader, RunOutcome,
};
use trackhound_gateway::{Gateway, GatewayConfig};
use trackhound_scraper::{CancellationToken, ScrapeOrchestrator};

/// Which worker is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// Extension discovery
    Discovery,
    /// A scrape run
    Scrape,
}

struct Worker {
    kind: WorkerKind,
    handle: JoinHandle<()>,
    cancel: Option<CancellationToken>,
}

/// Coordinates discovery, scraping and persisted state.
pub struct Controller {
    config: AppConfig,
    config_path: PathBuf,
    registry: ExtensionRegistry,
    cutoff: CutoffDate,
    discovery: Arc<Discovery>,
    gateway: Arc<Gateway>,
    events: EventSender,
    receiver: EventReceiver,
    worker: Option<Worker>,
}

impl Controller {
    /// Create a controller loading recipes from the configured extensions
    /// directory. `config_path` is where [`save_config`](Self::save_config)
    /// writes.
    pub fn new(config: AppConfig, config_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_loader(config, config_path, Arc::new(RecipeLoader))
    }

    /// Create a controller with a custom extension loader.
    pub fn with_loader(
        config: AppConfig,
        config_path: impl Into<PathBuf>,
        loader: Arc<dyn ExtensionLoader>,
    ) -> Result<Self> {
        let extensions_dir = config.extensions_dir()?;
        let gateway = Gateway::new(GatewayConfig::from_app_config(&config)?)?;
        let cutoff = CutoffDate::load(config.general.last_use);
        let (events, receiver) = events::channel();

        info!(
            extensions_dir = %extensions_dir.display(),
            cutoff = %cutoff,
            "controller ready"
        );

        Ok(Self {
            config,
            config_path: config_path.into(),
            registry: ExtensionRegistry::new(),
            cutoff,
            discovery: Arc::new(Discovery::new(loader, extensions_dir)),
            gateway: Arc::new(gateway),
            events,
            receiver,
            worker: None,
        })
    }

    /// The current configuration, without unsaved registry flags.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Where the configuration is saved.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The shared network gateway.
    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Add an observer of every event sent by later workers.
    pub fn subscribe(&mut self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Whether a worker is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.worker.is_some()
    }

    /// The running worker, if any.
    #[must_use]
    pub fn running(&self) -> Option<WorkerKind> {
        self.worker.as_ref().map(|worker| worker.kind)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_busy() {
            return Err(AppError::Busy);
        }
        Ok(())
    }

    /// Discard the registry and rediscover extensions in the background.
    ///
    /// Current flags are kept in the configuration and reapplied as records
    /// arrive.
    pub fn start_discovery(&mut self) -> Result<()> {
        self.ensure_idle()?;

        self.sync_settings();
        self.registry.clear();

        let discovery = self.discovery.clone();
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            let worker_events = events.clone();
            let result =
                tokio::task::spawn_blocking(move || discovery.run(&worker_events)).await;

            if let Err(e) = result {
                error!(error = %e, "discovery worker failed");
                events.log(format!("Extension scan aborted: {e}"));
                events.send(Event::DiscoveryFinished);
            }
        });

        self.worker = Some(Worker {
            kind: WorkerKind::Discovery,
            handle,
            cancel: None,
        });
        Ok(())
    }

    /// Run every enabled extension in the background.
    pub fn start_scrape(&mut self) -> Result<()> {
        self.ensure_idle()?;

        let cancel = CancellationToken::new();
        let orchestrator = ScrapeOrchestrator::new(self.gateway.clone(), self.events.clone())
            .with_cancellation(cancel.clone())
            .with_exclusions(self.config.blacklist.terms());
        let records = self.registry.snapshot();
        let cutoff = self.cutoff;
        let events = self.events.clone();

        info!(
            enabled = self.registry.enabled().count(),
            cutoff = %cutoff,
            "starting scrape"
        );

        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(orchestrator.run(records, cutoff))
                .catch_unwind()
                .await;

            if result.is_err() {
                error!("scrape worker panicked");
                events.log("Scrape aborted.");
                events.send(Event::RunFinished {
                    outcome: RunOutcome::Cancelled,
                });
            }
        });

        self.worker = Some(Worker {
            kind: WorkerKind::Scrape,
            handle,
            cancel: Some(cancel),
        });
        Ok(())
    }

    /// Ask the running scrape to stop before its next extension.
    ///
    /// Returns `false` if no scrape is running.
    pub fn cancel(&self) -> bool {
        match self.worker.as_ref().and_then(|worker| worker.cancel.as_ref()) {
            Some(cancel) => {
                info!("cancelling scrape");
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait for the next event and apply it.
    ///
    /// Discovered records are registered with their persisted flags, and the
    /// returned event carries the record as registered. Terminal events free
    /// the worker slot. Returns `None` when no worker is running and no event
    /// is queued.
    pub async fn next_event(&mut self) -> Option<Event> {
        let event = if self.worker.is_some() {
            self.receiver.recv().await?
        } else {
            self.receiver.try_recv()?
        };

        Some(self.apply(event))
    }

    fn apply(&mut self, event: Event) -> Event {
        match event {
            Event::ExtensionDiscovered(mut record) => {
                record.apply_settings(self.config.extensions.get(record.id.as_str()));
                if self.registry.insert(record.clone()) {
                    info!(extension = %record.id, enabled = record.enabled, "found extension");
                }
                Event::ExtensionDiscovered(record)
            }
            Event::DiscoveryFinished => {
                self.finish_worker();
                info!(count = self.registry.len(), "discovery finished");
                Event::DiscoveryFinished
            }
            Event::RunFinished { outcome } => {
                self.finish_worker();
                if outcome == RunOutcome::Completed {
                    self.advance_cutoff();
                }
                Event::RunFinished { outcome }
            }
            other => other,
        }
    }

    /// The terminal event is a worker's last action, so its task is
    /// detached rather than awaited.
    fn finish_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            debug!(kind = ?worker.kind, finished = worker.handle.is_finished(), "worker done");
        }
    }

    fn advance_cutoff(&mut self) {
        self.cutoff.advance();
        self.config.general.last_use = Some(self.cutoff.date());
        info!(cutoff = %self.cutoff, "advanced cutoff");

        if let Err(e) = self.save_config() {
            warn!(error = %e, "failed to persist cutoff");
        }
    }

    /// Process events until the running worker finishes, handing each one
    /// to `observer`.
    pub async fn run_until_idle(&mut self, mut observer: impl FnMut(&Event)) {
        while self.is_busy() {
            match self.next_event().await {
                Some(event) => observer(&event),
                None => break,
            }
        }
    }

    /// The registry, as last updated from events.
    #[must_use]
    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Enable or disable an extension.
    pub fn set_enabled(&mut self, id: &ExtensionId, enabled: bool) -> Result<()> {
        self.ensure_idle()?;
        self.registry.set_enabled(id, enabled)?;
        Ok(())
    }

    /// Enable or disable one sub-option of an extension.
    pub fn set_genre_enabled(&mut self, id: &ExtensionId, genre: &str, enabled: bool) -> Result<()> {
        self.ensure_idle()?;
        self.registry.set_genre_enabled(id, genre, enabled)?;
        Ok(())
    }

    /// Only releases on or after this date are fetched.
    #[must_use]
    pub fn cutoff(&self) -> CutoffDate {
        self.cutoff
    }

    /// Move the cutoff to `date`, unclamped.
    pub fn set_cutoff(&mut self, date: NaiveDate) -> Result<()> {
        self.ensure_idle()?;
        self.cutoff = CutoffDate::from_date(date);
        self.config.general.last_use = Some(date);
        Ok(())
    }

    /// Fold the registry flags into the configuration. Entries of
    /// extensions not currently registered are kept.
    fn sync_settings(&mut self) {
        self.config.extensions.extend(self.registry.export_settings());
    }

    /// Write the configuration, including current flags and cutoff.
    pub fn save_config(&mut self) -> Result<()> {
        self.sync_settings();
        self.config.general.last_use = Some(self.cutoff.date());
        self.config.save_to(&self.config_path)?;
        info!(path = %self.config_path.display(), "saved configuration");
        Ok(())
    }

    /// Remove every cached HTTP response.
    pub async fn clear_cache(&self) -> Result<()> {
        self.gateway.clear_cache().await?;
        Ok(())
    }
}

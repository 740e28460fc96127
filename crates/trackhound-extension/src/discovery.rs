//! Extension discovery.
//!
//! Discovery lists the candidate units, loads each one at most once per
//! process, validates it against the contract, runs its scan hook, and
//! publishes the surviving records on the event channel.

use crate::context::DiscoveryContext;
use crate::error::Result;
use crate::events::{Event, EventSender};
use crate::loader::ExtensionLoader;
use crate::module::ModuleHandle;
use crate::record::ExtensionRecord;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use trackhound_core::ExtensionId;

/// Scans an extensions directory with a loader.
///
/// Loaded modules are cached by identity, so running discovery again reuses
/// them instead of loading a second time.
pub struct Discovery {
    loader: Arc<dyn ExtensionLoader>,
    extensions_dir: PathBuf,
    modules: Mutex<HashMap<ExtensionId, ModuleHandle>>,
}

impl Discovery {
    /// Create a discovery over `extensions_dir`.
    pub fn new(loader: Arc<dyn ExtensionLoader>, extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            extensions_dir: extensions_dir.into(),
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// The directory being scanned.
    #[must_use]
    pub fn extensions_dir(&self) -> &Path {
        &self.extensions_dir
    }

    /// Run a full discovery, returning the number of records published.
    ///
    /// Emits `ExtensionDiscovered` for every valid extension and always ends
    /// with `DiscoveryFinished`. Per-extension failures are logged and the
    /// scan moves on.
    pub fn run(&self, events: &EventSender) -> usize {
        events.log("Initiating extension scan...");

        let found = match self.scan(events) {
            Ok(found) => found,
            Err(e) => {
                warn!(dir = %self.extensions_dir.display(), error = %e, "extension scan failed");
                events.log(format!("Extension scan failed: {e}"));
                0
            }
        };

        info!(
            count = found,
            dir = %self.extensions_dir.display(),
            "extension scan finished"
        );
        events.send(Event::DiscoveryFinished);
        found
    }

    fn scan(&self, events: &EventSender) -> Result<usize> {
        std::fs::create_dir_all(&self.extensions_dir)?;

        let candidates = self.loader.candidates(&self.extensions_dir)?;
        let ctx = DiscoveryContext::new(&self.extensions_dir, events);
        let mut found = 0;

        for id in candidates {
            let Some(module) = self.module(&id, events) else {
                continue;
            };

            let mut record = match ExtensionRecord::from_module(id.clone(), module.clone()) {
                Ok(record) => record,
                Err(e) => {
                    warn!(extension = %id, error = %e, "extension violates contract");
                    events.log(format!("Skipping {e}"));
                    self.unload(&id);
                    continue;
                }
            };

            if let Some(hook) = module.scan_hook() {
                let keep = catch_unwind(AssertUnwindSafe(|| hook.scan(&ctx, &mut record)))
                    .unwrap_or_else(|_| {
                        warn!(extension = %id, "scan hook panicked");
                        events.log(format!("Scan hook of {id} panicked"));
                        false
                    });

                if !keep {
                    debug!(extension = %id, "scan hook discarded extension");
                    continue;
                }
            }

            debug!(extension = %id, name = %record.name, "discovered extension");
            events.send(Event::ExtensionDiscovered(record));
            found += 1;
        }

        Ok(found)
    }

    /// The cached module for `id`, loading it on first use.
    fn module(&self, id: &ExtensionId, events: &EventSender) -> Option<ModuleHandle> {
        if let Some(module) = self.cached(id) {
            return Some(module);
        }

        match self.loader.load(&self.extensions_dir, id) {
            Ok(module) => {
                self.modules
                    .lock()
                    .expect("acquire lock on module cache")
                    .insert(id.clone(), module.clone());
                Some(module)
            }
            Err(e) => {
                warn!(extension = %id, error = %e, "failed to load extension");
                events.log(format!("Failed to load extension {id}: {e}"));
                None
            }
        }
    }

    fn cached(&self, id: &ExtensionId) -> Option<ModuleHandle> {
        self.modules
            .lock()
            .expect("acquire lock on module cache")
            .get(id)
            .cloned()
    }

    /// Forget a loaded module so the next discovery loads it again.
    pub fn unload(&self, id: &ExtensionId) -> bool {
        self.modules
            .lock()
            .expect("acquire lock on module cache")
            .remove(id)
            .is_some()
    }

    /// Forget every loaded module.
    pub fn clear_cache(&self) {
        self.modules
            .lock()
            .expect("acquire lock on module cache")
            .clear();
    }

    /// Whether a module is loaded for `id`.
    #[must_use]
    pub fn is_loaded(&self, id: &ExtensionId) -> bool {
        self.cached(id).is_some()
    }

    /// Number of loaded modules.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.modules
            .lock()
            .expect("acquire lock on module cache")
            .len()
    }
}

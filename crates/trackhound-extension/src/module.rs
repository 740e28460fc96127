//! The extension contract.
//!
//! A loaded extension is a [`ModuleHandle`]. To be accepted by discovery it
//! must expose a metadata table under [`METADATA_MARKER`] with at least a
//! `name`, and an [`EntryPoint`] under [`ENTRY_POINT`]. A [`ScanHook`] under
//! [`SCAN_HOOK`] is optional.

use crate::context::{DiscoveryContext, ScrapeContext};
use crate::record::ExtensionRecord;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Name of the metadata table every extension must carry.
pub const METADATA_MARKER: &str = "trackhound";

/// Name of the scrape entry point.
pub const ENTRY_POINT: &str = "scrape";

/// Name of the optional discovery-time hook.
pub const SCAN_HOOK: &str = "scan";

/// A loaded extension unit.
pub trait ExtensionModule: Send + Sync {
    /// The metadata table, if the unit declares one.
    fn metadata(&self) -> Option<&toml::Table>;

    /// The scrape entry point, if the unit declares one.
    fn entry_point(&self) -> Option<&dyn EntryPoint>;

    /// The discovery-time hook, if the unit declares one.
    fn scan_hook(&self) -> Option<&dyn ScanHook> {
        None
    }
}

/// Shared handle to a loaded module.
pub type ModuleHandle = Arc<dyn ExtensionModule>;

/// Scrape entry point of an extension.
///
/// Results are reported through [`ScrapeContext::emit`]. An `Err` is logged
/// by the orchestrator and does not stop the run.
#[async_trait]
pub trait EntryPoint: Send + Sync {
    /// Scrape new releases since `ctx.cutoff()`.
    async fn scrape(&self, ctx: &ScrapeContext, record: &ExtensionRecord) -> anyhow::Result<()>;
}

/// Discovery-time hook.
///
/// May add sub-options to the record. Returning `false` discards the
/// extension for this discovery.
pub trait ScanHook: Send + Sync {
    /// Inspect or extend the record before it is published.
    fn scan(&self, ctx: &DiscoveryContext<'_>, record: &mut ExtensionRecord) -> bool;
}

impl<F> ScanHook for F
where
    F: Fn(&DiscoveryContext<'_>, &mut ExtensionRecord) -> bool + Send + Sync,
{
    fn scan(&self, ctx: &DiscoveryContext<'_>, record: &mut ExtensionRecord) -> bool {
        self(ctx, record)
    }
}

/// An extension assembled in code, for compiled-in scrapers.
#[derive(Default)]
pub struct NativeModule {
    metadata: Option<toml::Table>,
    entry_point: Option<Box<dyn EntryPoint>>,
    scan_hook: Option<Box<dyn ScanHook>>,
}

impl NativeModule {
    /// Create an empty module. It fails the contract until metadata and
    /// an entry point are attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a metadata table.
    #[must_use]
    pub fn with_metadata(mut self, metadata: toml::Table) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach metadata with just a display name.
    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Self {
        let mut metadata = toml::Table::new();
        metadata.insert("name".to_string(), toml::Value::String(name.into()));
        self.with_metadata(metadata)
    }

    /// Attach the scrape entry point.
    #[must_use]
    pub fn with_entry_point(mut self, entry_point: impl EntryPoint + 'static) -> Self {
        self.entry_point = Some(Box::new(entry_point));
        self
    }

    /// Attach a discovery-time hook.
    #[must_use]
    pub fn with_scan_hook(mut self, scan_hook: impl ScanHook + 'static) -> Self {
        self.scan_hook = Some(Box::new(scan_hook));
        self
    }

    /// Wrap into a shareable handle.
    #[must_use]
    pub fn into_handle(self) -> ModuleHandle {
        Arc::new(self)
    }
}

impl ExtensionModule for NativeModule {
    fn metadata(&self) -> Option<&toml::Table> {
        self.metadata.as_ref()
    }

    fn entry_point(&self) -> Option<&dyn EntryPoint> {
        self.entry_point.as_deref()
    }

    fn scan_hook(&self) -> Option<&dyn ScanHook> {
        self.scan_hook.as_deref()
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("metadata", &self.metadata)
            .field("entry_point", &self.entry_point.is_some())
            .field("scan_hook", &self.scan_hook.is_some())
            .finish()
    }
}

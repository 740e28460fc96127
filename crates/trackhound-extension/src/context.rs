//! What an extension sees while it runs.

use crate::events::{Event, EventSender};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;
use trackhound_core::{CutoffDate, ExtensionId, ResultItem};
use trackhound_gateway::{parse_html, parse_json, FetchedPage, Gateway, Html, Method, RequestOptions};

/// Handed to an extension's entry point for the duration of one scrape.
///
/// Failures of the helpers here are reported on the event channel and
/// surface to the extension as `None`.
pub struct ScrapeContext {
    source: ExtensionId,
    events: EventSender,
    gateway: Arc<Gateway>,
    cutoff: CutoffDate,
    exclusions: Arc<[String]>,
    emitted: AtomicUsize,
}

impl ScrapeContext {
    /// Create a context for the extension `source`.
    ///
    /// `exclusions` must already be lowercase.
    #[must_use]
    pub fn new(
        source: ExtensionId,
        events: EventSender,
        gateway: Arc<Gateway>,
        cutoff: CutoffDate,
        exclusions: Arc<[String]>,
    ) -> Self {
        Self {
            source,
            events,
            gateway,
            cutoff,
            exclusions,
            emitted: AtomicUsize::new(0),
        }
    }

    /// The extension this context belongs to.
    #[must_use]
    pub fn source(&self) -> &ExtensionId {
        &self.source
    }

    /// Only releases on or after this date are wanted.
    #[must_use]
    pub fn cutoff(&self) -> CutoffDate {
        self.cutoff
    }

    /// User exclusion terms, lowercase.
    #[must_use]
    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    /// Whether `text` contains any exclusion term, ignoring case.
    #[must_use]
    pub fn is_excluded(&self, text: &str) -> bool {
        if self.exclusions.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.exclusions.iter().any(|term| text.contains(term.as_str()))
    }

    /// The shared network gateway.
    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Send a log line to the consumer.
    pub fn log(&self, line: impl Into<String>) {
        self.events.log(line);
    }

    /// Report a result.
    pub fn emit(&self, item: ResultItem) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        self.events.send(Event::ResultFound {
            item,
            source: self.source.clone(),
        });
    }

    /// Number of results reported so far.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Fetch through the gateway, logging failures to the consumer.
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Option<FetchedPage> {
        match self.gateway.try_request(method, url, &options).await {
            Ok(page) => Some(page),
            Err(e) => {
                if !options.silent {
                    warn!(extension = %self.source, url = %url, error = %e, "request failed");
                    self.log(format!("Request to {url} failed: {e}"));
                }
                None
            }
        }
    }

    /// `GET` with default options.
    pub async fn get(&self, url: &str) -> Option<FetchedPage> {
        self.fetch(Method::GET, url, RequestOptions::default()).await
    }

    /// Parse a page into an HTML tree, logging failures to the consumer.
    #[must_use]
    pub fn html(&self, page: Option<&FetchedPage>) -> Option<Html> {
        let page = page?;
        match parse_html(page) {
            Ok(document) => Some(document),
            Err(e) => {
                self.log(format!("Failed to parse {}: {e}", page.url));
                None
            }
        }
    }

    /// Parse a page as JSON, logging failures to the consumer.
    #[must_use]
    pub fn json<T: DeserializeOwned>(&self, page: Option<&FetchedPage>) -> Option<T> {
        let page = page?;
        match parse_json(page) {
            Ok(value) => Some(value),
            Err(e) => {
                self.log(format!("Failed to parse {}: {e}", page.url));
                None
            }
        }
    }
}

/// Handed to an extension's scan hook during discovery.
pub struct DiscoveryContext<'a> {
    extensions_dir: &'a Path,
    events: &'a EventSender,
}

impl<'a> DiscoveryContext<'a> {
    /// Create a discovery context.
    #[must_use]
    pub fn new(extensions_dir: &'a Path, events: &'a EventSender) -> Self {
        Self {
            extensions_dir,
            events,
        }
    }

    /// The directory being scanned.
    #[must_use]
    pub fn extensions_dir(&self) -> &Path {
        self.extensions_dir
    }

    /// Send a log line to the consumer.
    pub fn log(&self, line: impl Into<String>) {
        self.events.log(line);
    }
}

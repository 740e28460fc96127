//! On-disk response cache keyed by request signature.
//!
//! Entries are JSON files named after the SHA-256 signature of the request.
//! A fresh entry (within `Cache-Control: max-age`) is served without touching
//! the network; a stale entry with validators is revalidated with a
//! conditional request.

use crate::error::Result;
use crate::request::{FetchedPage, RequestOptions};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, CACHE_CONTROL, ETAG, LAST_MODIFIED};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Final URL of the cached response
    pub url: String,
    /// Status of the cached response
    pub status: u16,
    /// Cached body
    pub body: String,
    /// `ETag` validator
    pub etag: Option<String>,
    /// `Last-Modified` validator
    pub last_modified: Option<String>,
    /// When the entry was stored or last revalidated
    pub stored_at: DateTime<Utc>,
    /// Freshness lifetime from `Cache-Control: max-age`
    pub max_age_secs: Option<u64>,
}

impl CacheEntry {
    /// Build an entry from a fetched page and its response headers.
    ///
    /// Returns `None` when the response forbids storing.
    #[must_use]
    pub fn from_response(page: &FetchedPage, headers: &HeaderMap, now: DateTime<Utc>) -> Option<Self> {
        let cache_control = header_str(headers, CACHE_CONTROL.as_str()).unwrap_or_default();
        if cache_control
            .split(',')
            .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"))
        {
            return None;
        }

        Some(Self {
            url: page.url.clone(),
            status: page.status,
            body: page.body.clone(),
            etag: header_str(headers, ETAG.as_str()),
            last_modified: header_str(headers, LAST_MODIFIED.as_str()),
            stored_at: now,
            max_age_secs: parse_max_age(&cache_control),
        })
    }

    /// Whether the entry may be served without revalidation at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.max_age_secs.and_then(|secs| i64::try_from(secs).ok()) {
            Some(secs) => now < self.stored_at + Duration::seconds(secs),
            None => false,
        }
    }

    /// Whether the entry carries validators for a conditional request.
    #[must_use]
    pub fn can_revalidate(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    /// Convert the entry into a page served from cache.
    #[must_use]
    pub fn to_page(&self) -> FetchedPage {
        FetchedPage {
            url: self.url.clone(),
            status: self.status,
            body: self.body.clone(),
            from_cache: true,
        }
    }
}

/// Directory-backed store of [`CacheEntry`] values.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Create a cache rooted at `dir`. The directory is created on first store.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load an entry. Missing or corrupt entries read as `None`.
    pub async fn load(&self, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let contents = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&contents) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Store an entry, replacing any previous one.
    pub async fn store(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let contents = serde_json::to_string(entry).map_err(std::io::Error::other)?;
        tokio::fs::write(self.entry_path(key), contents).await?;
        Ok(())
    }

    /// Remove every cached entry.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Signature of a request: SHA-256 over method, URL, query, headers and body.
#[must_use]
pub fn signature(method: &Method, url: &str, options: &RequestOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());

    for (name, value) in &options.query {
        hasher.update(format!("\nq:{name}={value}").as_bytes());
    }

    let mut headers: Vec<_> = options
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect();
    headers.sort();
    for (name, value) in headers {
        hasher.update(format!("\nh:{name}={value}").as_bytes());
    }

    for (name, value) in &options.form {
        hasher.update(format!("\nf:{name}={value}").as_bytes());
    }

    if let Some(body) = &options.body {
        hasher.update(b"\nb:");
        hasher.update(body.as_bytes());
    }

    hex::encode(hasher.finalize())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

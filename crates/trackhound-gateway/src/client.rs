//! The caching HTTP session shared by all extensions of a run.

use crate::cache::{signature, CacheEntry, ResponseCache};
use crate::error::{GatewayError, Result};
use crate::parse::{parse_html, parse_json};
use crate::request::{FetchedPage, RequestOptions};
use chrono::Utc;
use reqwest::cookie::Jar;
use reqwest::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::{Client, Method, StatusCode};
use scraper::Html;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};
use trackhound_core::{AppConfig, ConfigResult};

/// Timeout applied to every gateway request, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Gateway construction settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
    /// Response cache directory; `None` disables caching
    pub cache_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            user_agent: trackhound_core::NetworkConfig::default().user_agent,
            cache_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Derive gateway settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> ConfigResult<Self> {
        Ok(Self {
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            user_agent: config.network.user_agent.clone(),
            cache_dir: config.http_cache_dir()?,
        })
    }
}

/// Caching HTTP client with a persistent cookie session.
///
/// Requests are fail-soft: [`Gateway::request`] logs failures and returns
/// `None`. Use [`Gateway::try_request`] to inspect the error instead.
pub struct Gateway {
    config: GatewayConfig,
    client: RwLock<Client>,
    cache: Option<ResponseCache>,
}

impl Gateway {
    /// Create a gateway with a fresh session.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Self::build_client(&config)?;
        let cache = config.cache_dir.clone().map(ResponseCache::new);

        debug!(
            timeout = ?config.timeout,
            cache = ?config.cache_dir,
            "created network gateway"
        );

        Ok(Self {
            config,
            client: RwLock::new(client),
            cache,
        })
    }

    fn build_client(config: &GatewayConfig) -> Result<Client> {
        Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .cookie_provider(Arc::new(Jar::default()))
            .build()
            .map_err(GatewayError::Client)
    }

    /// Gateway settings.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Drop all accumulated cookies by starting a new session.
    pub fn reset_session(&self) -> Result<()> {
        let client = Self::build_client(&self.config)?;
        *self
            .client
            .write()
            .expect("acquire write lock on session") = client;
        debug!("reset gateway session");
        Ok(())
    }

    fn client(&self) -> Client {
        self.client
            .read()
            .expect("acquire read lock on session")
            .clone()
    }

    /// Perform a request, returning `None` on any failure.
    ///
    /// Failures are logged unless `options.silent` is set.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Option<FetchedPage> {
        match self.try_request(method.clone(), url, &options).await {
            Ok(page) => Some(page),
            Err(e) => {
                if !options.silent {
                    warn!(method = %method, url = %url, error = %e, "request failed");
                }
                None
            }
        }
    }

    /// Convenience `GET` with default options.
    pub async fn get(&self, url: &str) -> Option<FetchedPage> {
        self.request(Method::GET, url, RequestOptions::default())
            .await
    }

    /// Perform a request and report the failure reason.
    pub async fn try_request(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<FetchedPage> {
        if url.trim().is_empty() {
            return Err(GatewayError::EmptyUrl);
        }

        if options.reset_session {
            self.reset_session()?;
        }

        let cache = self.cache.as_ref().filter(|_| method == Method::GET);
        let key = signature(&method, url, options);

        let cached = match cache {
            Some(cache) => cache.load(&key).await,
            None => None,
        };

        if let Some(entry) = &cached {
            if entry.is_fresh(Utc::now()) {
                debug!(url = %url, "serving fresh response from cache");
                return Ok(entry.to_page());
            }
        }
        let cached = cached.filter(CacheEntry::can_revalidate);

        let mut builder = self.client().request(method, url);

        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }

        if !options.form.is_empty() {
            builder = builder.form(&options.form);
        } else if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }

        if let Some(entry) = &cached {
            if let Some(etag) = &entry.etag {
                builder = builder.header(IF_NONE_MATCH, etag.as_str());
            }
            if let Some(last_modified) = &entry.last_modified {
                builder = builder.header(IF_MODIFIED_SINCE, last_modified.as_str());
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(url, e))?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            if let (Some(cache), Some(mut entry)) = (cache, cached) {
                debug!(url = %url, "cached response revalidated");
                entry.stored_at = Utc::now();
                if let Err(e) = cache.store(&key, &entry).await {
                    debug!(url = %url, error = %e, "failed to refresh cache entry");
                }
                return Ok(entry.to_page());
            }
        }

        if !status.is_success() {
            return Err(GatewayError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::from_reqwest(url, e))?;

        let page = FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
            from_cache: false,
        };

        if let Some(cache) = cache {
            if let Some(entry) = CacheEntry::from_response(&page, &headers, Utc::now()) {
                if let Err(e) = cache.store(&key, &entry).await {
                    debug!(url = %url, error = %e, "failed to store cache entry");
                }
            }
        }

        Ok(page)
    }

    /// Parse a fetched page into an HTML tree, returning `None` on failure.
    #[must_use]
    pub fn html(&self, page: Option<&FetchedPage>) -> Option<Html> {
        let page = page?;
        match parse_html(page) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(url = %page.url, error = %e, "failed to parse page");
                None
            }
        }
    }

    /// Parse a fetched page as JSON, returning `None` on failure.
    #[must_use]
    pub fn json<T: DeserializeOwned>(&self, page: Option<&FetchedPage>) -> Option<T> {
        let page = page?;
        match parse_json(page) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(url = %page.url, error = %e, "failed to parse page");
                None
            }
        }
    }

    /// Remove every cached response.
    pub async fn clear_cache(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.clear().await?;
        }
        Ok(())
    }
}

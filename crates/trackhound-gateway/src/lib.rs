//! Trackhound Gateway - Shared network and content-parsing gateway.
//!
//! Every extension fetches through one [`Gateway`]: a persistent HTTP session
//! with a cookie jar, a fixed request timeout and an on-disk response cache.
//! Failures never propagate to the caller of [`Gateway::request`]; they are
//! logged and surface as `None` so one bad fetch degrades a scrape instead of
//! aborting it.
//!
//! # Example
//!
//! ```rust,ignore
//! use trackhound_gateway::{Gateway, GatewayConfig, RequestOptions};
//! use reqwest::Method;
//!
//! let gateway = Gateway::new(GatewayConfig::default())?;
//! let page = gateway
//!     .request(Method::GET, "https://example.com/releases", RequestOptions::new().reset_session())
//!     .await;
//! if let Some(document) = gateway.html(page.as_ref()) {
//!     // traverse the document
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod client;
pub mod error;
pub mod parse;
pub mod request;

// Re-export commonly used types
pub use client::{Gateway, GatewayConfig, REQUEST_TIMEOUT_SECS};
pub use error::{GatewayError, Result};
pub use parse::{parse_html, parse_json};
pub use request::{FetchedPage, RequestOptions};

pub use reqwest::Method;
pub use scraper::Html;

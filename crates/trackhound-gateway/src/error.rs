//! Error types for the network gateway.

use thiserror::Error;

/// Errors that can occur while fetching or parsing content.
///
/// These never escape the fail-soft gateway operations; they are rendered into
/// log lines and exposed only through [`crate::Gateway::try_request`].
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request URL was empty
    #[error("empty URL")]
    EmptyUrl,

    /// The HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport-level failure (DNS, connection, invalid URL, body read)
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying error
        #[source]
        source: reqwest::Error,
    },

    /// The request exceeded the gateway timeout
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL
        url: String,
    },

    /// The server answered with a non-success status
    #[error("request to {url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The body could not be turned into a content tree
    #[error("failed to parse content from {url}: {reason}")]
    Parse {
        /// URL the content came from
        url: String,
        /// Reason for the failure
        reason: String,
    },

    /// The body was not valid JSON for the requested shape
    #[error("failed to parse JSON from {url}: {source}")]
    Json {
        /// URL the content came from
        url: String,
        /// JSON error
        #[source]
        source: serde_json::Error,
    },

    /// I/O error while accessing the response cache
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub(crate) fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

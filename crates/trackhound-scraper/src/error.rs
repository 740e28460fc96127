//! Failures of a single extension during a run.

use thiserror::Error;

/// Why an extension did not finish cleanly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    /// The entry point returned an error
    #[error("{message}")]
    Failed {
        /// Rendered error chain
        message: String,
    },

    /// The entry point panicked
    #[error("panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string
        message: String,
    },

    /// The record has no entry point
    #[error("no entry point")]
    MissingEntryPoint,
}

impl ScrapeError {
    /// Build from a panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::Panicked { message }
    }
}

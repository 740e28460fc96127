//! Error types for the extension subsystem.

use thiserror::Error;

/// Errors that can occur while loading, validating or running extensions.
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// Extension not present in the registry or loader
    #[error("extension not found: {id}")]
    NotFound {
        /// The extension ID that was not found
        id: String,
    },

    /// Failed to read an extension unit
    #[error("failed to load extension from {path}: {source}")]
    LoadError {
        /// Path to the extension unit
        path: String,
        /// Underlying error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse an extension unit
    #[error("failed to parse extension TOML in {path}: {source}")]
    ParseError {
        /// Path to the extension unit
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// The extension does not satisfy the extension contract
    #[error("extension {id} {reason}")]
    Contract {
        /// Extension ID being validated
        id: String,
        /// What is missing or malformed
        reason: String,
    },

    /// I/O error while accessing the extensions directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid extension ID
    #[error("invalid extension ID: {0}")]
    InvalidId(#[from] trackhound_core::TrackhoundError),
}

/// Result type for extension operations.
pub type Result<T> = std::result::Result<T, ExtensionError>;

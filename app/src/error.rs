//! Error types for controller operations.

use thiserror::Error;
use trackhound_core::ConfigError;
use trackhound_extension::ExtensionError;
use trackhound_gateway::GatewayError;

/// Errors returned to callers of the [`Controller`](crate::Controller).
#[derive(Error, Debug)]
pub enum AppError {
    /// A discovery or scrape is already running
    #[error("another operation is already running")]
    Busy,

    /// Configuration could not be loaded or saved
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registry lookup or extension setup failed
    #[error(transparent)]
    Extension(#[from] ExtensionError),

    /// The network gateway could not be created
    #[error("network error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, AppError>;

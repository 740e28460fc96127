//! Error types shared by the Trackhound crates.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by core types.
#[derive(Error, Debug)]
pub enum TrackhoundError {
    /// An extension identity was rejected
    #[error("invalid extension ID '{id}': {reason}")]
    InvalidId {
        /// The rejected identity
        id: String,
        /// Which rule it broke
        reason: &'static str,
    },
}

/// Errors raised while reading or writing `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No home directory to derive the platform paths from
    #[error("could not determine the platform config directory")]
    NoConfigDir,

    /// The file is not valid TOML or does not match the schema
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be rendered as TOML
    #[error("failed to render config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The config path has no parent directory to create
    #[error("config path {} has no parent directory", .0.display())]
    NoParentDir(PathBuf),

    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_id_display() {
        let err = TrackhoundError::InvalidId {
            id: "../x".to_string(),
            reason: "must not contain path separators",
        };
        assert_eq!(
            err.to_string(),
            "invalid extension ID '../x': must not contain path separators"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NoParentDir(PathBuf::from("/"));
        assert_eq!(err.to_string(), "config path / has no parent directory");
    }
}

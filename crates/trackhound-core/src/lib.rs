//! Trackhound Core - Foundation crate for the Trackhound release aggregator.
//!
//! This crate provides shared types, error handling, configuration management
//! and the incremental-sync cutoff that all other Trackhound crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`ExtensionId`, `ResultItem`)
//! - [`cutoff`] - The "fetch since" date consulted by extensions
//!
//! # Example
//!
//! ```rust
//! use trackhound_core::{AppConfig, CutoffDate};
//!
//! let config = AppConfig::default();
//! let cutoff = CutoffDate::load(config.general.last_use);
//! println!("Fetching releases since {cutoff}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod cutoff;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BlacklistConfig, ExtensionSettings, GeneralConfig, NetworkConfig};
pub use cutoff::{CutoffDate, MAX_BACKLOG_DAYS};
pub use error::{ConfigError, ConfigResult, TrackhoundError};
pub use types::{ExtensionId, ResultItem};

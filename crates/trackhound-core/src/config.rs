//! Configuration management for Trackhound.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. The configuration also carries the state
//! persisted between runs: the last-run date and the per-extension flags.

use crate::error::{ConfigError, ConfigResult};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/trackhound/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// Network gateway settings
    pub network: NetworkConfig,
    /// Free-text exclusion list handed to extensions
    pub blacklist: BlacklistConfig,
    /// Persisted per-extension flags, keyed by extension identity
    pub extensions: BTreeMap<String, ExtensionSettings>,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific path, falling back to defaults if missing.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `TRACKHOUND_EXTENSIONS_DIR`: Override the extensions directory
    /// - `TRACKHOUND_NO_CACHE`: Disable the on-disk response cache (true/false)
    /// - `TRACKHOUND_USER_AGENT`: Override the HTTP user agent
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides to an already loaded config.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("TRACKHOUND_EXTENSIONS_DIR") {
            if !val.is_empty() {
                tracing::debug!("Override general.extensions_dir from env: {}", val);
                self.general.extensions_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("TRACKHOUND_NO_CACHE") {
            if let Ok(no_cache) = val.parse::<bool>() {
                self.network.cache = !no_cache;
                tracing::debug!("Override network.cache from env: {}", !no_cache);
            }
        }

        if let Ok(val) = std::env::var("TRACKHOUND_USER_AGENT") {
            if !val.is_empty() {
                tracing::debug!("Override network.user_agent from env: {}", val);
                self.network.user_agent = val;
            }
        }
    }

    /// Save configuration to the default location.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, config_path: &Path) -> ConfigResult<()> {
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::NoParentDir(config_path.to_path_buf()))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/trackhound/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/trackhound`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Get the cache directory path.
    ///
    /// Uses XDG base directories: `~/.cache/trackhound`
    pub fn cache_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.cache_dir().to_path_buf())
    }

    /// Directory scanned for extension units.
    ///
    /// Falls back to `<data_dir>/extensions` when not configured.
    pub fn extensions_dir(&self) -> ConfigResult<PathBuf> {
        match &self.general.extensions_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("extensions")),
        }
    }

    /// Directory holding the HTTP response cache, or `None` when caching is disabled.
    pub fn http_cache_dir(&self) -> ConfigResult<Option<PathBuf>> {
        if self.network.cache {
            Ok(Some(Self::cache_dir()?.join("http")))
        } else {
            Ok(None)
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "trackhound", "trackhound").ok_or(ConfigError::NoConfigDir)
}

/// General application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Date of the last completed scrape (the persisted cutoff)
    pub last_use: Option<NaiveDate>,
    /// Directory scanned for extensions
    pub extensions_dir: Option<PathBuf>,
}

/// Network gateway settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// User agent string
    pub user_agent: String,
    /// Whether responses are cached on disk
    pub cache: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "Trackhound/0.1.0 (+https://github.com/trackhound/trackhound)"
                .to_string(),
            cache: true,
        }
    }
}

/// Free-text exclusion list.
///
/// Extensions consult it at their own discretion; the core never enforces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistConfig {
    /// Raw text, one term per line or comma-separated
    pub terms: String,
}

impl BlacklistConfig {
    /// Split the raw text into lowercase, non-empty terms.
    #[must_use]
    pub fn terms(&self) -> Vec<String> {
        self.terms
            .split(['\n', ','])
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect()
    }
}

/// Persisted flags for one extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionSettings {
    /// Whether the extension runs during a scrape
    pub enabled: bool,
    /// Per sub-option (genre) enabled flags
    pub genres: BTreeMap<String, bool>,
}

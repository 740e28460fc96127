//! Normalized description of a discovered extension.

use crate::error::{ExtensionError, Result};
use crate::module::{ModuleHandle, ENTRY_POINT, METADATA_MARKER};
use std::collections::BTreeMap;
use std::fmt;
use trackhound_core::{ExtensionId, ExtensionSettings};

/// A discovered extension, as published to the consumer.
///
/// Metadata fields are normalized: missing optional fields become empty
/// strings and sub-option names are lowercase. Every record starts disabled.
#[derive(Clone)]
pub struct ExtensionRecord {
    /// Identity derived from the unit name
    pub id: ExtensionId,
    /// Display name
    pub name: String,
    /// Author, or empty
    pub author: String,
    /// Version, or empty
    pub version: String,
    /// Description, or empty
    pub description: String,
    /// Whether the extension runs during a scrape
    pub enabled: bool,
    genres: BTreeMap<String, bool>,
    module: ModuleHandle,
}

impl ExtensionRecord {
    /// Validate a loaded module against the contract and build its record.
    ///
    /// # Errors
    /// Returns [`ExtensionError::Contract`] if the metadata table or its
    /// `name` is missing, or if the unit has no entry point.
    pub fn from_module(id: ExtensionId, module: ModuleHandle) -> Result<Self> {
        let contract = |reason: &str| ExtensionError::Contract {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let Some(metadata) = module.metadata() else {
            return Err(contract(&format!(
                "is missing the required `{METADATA_MARKER}` metadata"
            )));
        };

        let name = match metadata.get("name") {
            Some(toml::Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            Some(_) => return Err(contract("has an invalid metadata name")),
            None => return Err(contract("is missing the required metadata name")),
        };

        if module.entry_point().is_none() {
            return Err(contract(&format!("is missing the `{ENTRY_POINT}` entry point")));
        }

        let field = |key: &str| {
            metadata
                .get(key)
                .and_then(toml::Value::as_str)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        let genres = metadata
            .get("genres")
            .and_then(toml::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(toml::Value::as_str)
                    .map(|genre| genre.trim().to_lowercase())
                    .filter(|genre| !genre.is_empty())
                    .map(|genre| (genre, true))
                    .collect()
            })
            .unwrap_or_default();

        let author = field("author");
        let version = field("version");
        let description = field("description");

        Ok(Self {
            id,
            name,
            author,
            version,
            description,
            enabled: false,
            genres,
            module,
        })
    }

    /// The loaded module backing this record.
    #[must_use]
    pub fn module(&self) -> &ModuleHandle {
        &self.module
    }

    /// Sub-options and their enabled flags, keyed by lowercase name.
    #[must_use]
    pub fn genres(&self) -> &BTreeMap<String, bool> {
        &self.genres
    }

    /// Enabled sub-option names, in order.
    pub fn enabled_genres(&self) -> impl Iterator<Item = &str> {
        self.genres
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(genre, _)| genre.as_str())
    }

    /// Whether a sub-option is enabled. Unknown sub-options are not.
    #[must_use]
    pub fn is_genre_enabled(&self, genre: &str) -> bool {
        self.genres
            .get(&genre.trim().to_lowercase())
            .copied()
            .unwrap_or(false)
    }

    /// Add a sub-option, enabled. Existing flags are left untouched.
    pub fn insert_genre(&mut self, genre: &str) {
        let genre = genre.trim().to_lowercase();
        if !genre.is_empty() {
            self.genres.entry(genre).or_insert(true);
        }
    }

    /// Set the flag of an existing sub-option.
    ///
    /// Returns `false` if the record has no such sub-option.
    pub fn set_genre_enabled(&mut self, genre: &str, enabled: bool) -> bool {
        match self.genres.get_mut(&genre.trim().to_lowercase()) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }

    /// Apply persisted flags. Without settings the record is disabled and its
    /// sub-options keep their defaults.
    pub fn apply_settings(&mut self, settings: Option<&ExtensionSettings>) {
        let Some(settings) = settings else {
            self.enabled = false;
            return;
        };

        self.enabled = settings.enabled;
        for (genre, enabled) in &settings.genres {
            self.set_genre_enabled(genre, *enabled);
        }
    }

    /// Current flags in their persisted form.
    #[must_use]
    pub fn settings(&self) -> ExtensionSettings {
        ExtensionSettings {
            enabled: self.enabled,
            genres: self.genres.clone(),
        }
    }
}

impl fmt::Debug for ExtensionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("author", &self.author)
            .field("version", &self.version)
            .field("description", &self.description)
            .field("enabled", &self.enabled)
            .field("genres", &self.genres)
            .finish_non_exhaustive()
    }
}

//! Consumer-side collection of discovered extensions.

use crate::error::{ExtensionError, Result};
use crate::record::ExtensionRecord;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use trackhound_core::{ExtensionId, ExtensionSettings};

/// Insertion-ordered records, unique by identity.
///
/// Owned by the consumer and mutated only by it. Workers receive a
/// [`snapshot`](Self::snapshot).
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    records: Vec<ExtensionRecord>,
}

impl ExtensionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. A record whose identity is already present is ignored
    /// and `false` is returned.
    pub fn insert(&mut self, record: ExtensionRecord) -> bool {
        if self.contains(&record.id) {
            warn!(extension = %record.id, "ignoring duplicate extension");
            return false;
        }

        debug!(extension = %record.id, "registered extension");
        self.records.push(record);
        true
    }

    /// Look up a record.
    #[must_use]
    pub fn get(&self, id: &ExtensionId) -> Option<&ExtensionRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    /// Look up a record for mutation.
    pub fn get_mut(&mut self, id: &ExtensionId) -> Option<&mut ExtensionRecord> {
        self.records.iter_mut().find(|record| &record.id == id)
    }

    /// Whether a record with this identity is present.
    #[must_use]
    pub fn contains(&self, id: &ExtensionId) -> bool {
        self.get(id).is_some()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionRecord> {
        self.records.iter()
    }

    /// Enabled records in insertion order.
    pub fn enabled(&self) -> impl Iterator<Item = &ExtensionRecord> {
        self.records.iter().filter(|record| record.enabled)
    }

    /// An owned copy of every record, for handing to a worker.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ExtensionRecord> {
        self.records.clone()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Enable or disable an extension.
    pub fn set_enabled(&mut self, id: &ExtensionId, enabled: bool) -> Result<()> {
        let record = self.get_mut(id).ok_or_else(|| not_found(id))?;
        record.enabled = enabled;
        Ok(())
    }

    /// Enable or disable one sub-option of an extension.
    pub fn set_genre_enabled(&mut self, id: &ExtensionId, genre: &str, enabled: bool) -> Result<()> {
        let record = self.get_mut(id).ok_or_else(|| not_found(id))?;
        if record.set_genre_enabled(genre, enabled) {
            Ok(())
        } else {
            Err(ExtensionError::NotFound {
                id: format!("{id}/{genre}"),
            })
        }
    }

    /// Apply persisted flags to every record.
    pub fn apply_settings(&mut self, settings: &BTreeMap<String, ExtensionSettings>) {
        for record in &mut self.records {
            record.apply_settings(settings.get(record.id.as_str()));
        }
    }

    /// Current flags of every record, keyed by identity.
    #[must_use]
    pub fn export_settings(&self) -> BTreeMap<String, ExtensionSettings> {
        self.records
            .iter()
            .map(|record| (record.id.to_string(), record.settings()))
            .collect()
    }
}

fn not_found(id: &ExtensionId) -> ExtensionError {
    ExtensionError::NotFound { id: id.to_string() }
}

impl<'a> IntoIterator for &'a ExtensionRegistry {
    type Item = &'a ExtensionRecord;
    type IntoIter = std::slice::Iter<'a, ExtensionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScrapeContext;
    use crate::module::{EntryPoint, NativeModule};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl EntryPoint for Noop {
        async fn scrape(&self, _ctx: &ScrapeContext, _record: &ExtensionRecord) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn record(id: &str, genres: &[&str]) -> ExtensionRecord {
        let mut metadata = toml::Table::new();
        metadata.insert("name".to_string(), toml::Value::String(id.to_uppercase()));
        metadata.insert(
            "genres".to_string(),
            toml::Value::Array(genres.iter().map(|g| toml::Value::String((*g).to_string())).collect()),
        );
        let module = NativeModule::new()
            .with_metadata(metadata)
            .with_entry_point(Noop)
            .into_handle();
        ExtensionRecord::from_module(ExtensionId::new(id).expect("valid id"), module)
            .expect("valid record")
    }

    fn id(name: &str) -> ExtensionId {
        ExtensionId::new(name).expect("valid id")
    }

    #[test]
    fn test_insert_keeps_order_and_ignores_duplicates() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.insert(record("b", &[])));
        assert!(registry.insert(record("a", &[])));
        assert!(!registry.insert(record("b", &["house"])));

        let ids: Vec<_> = registry.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(registry.get(&id("b")).expect("present").genres().is_empty());
    }

    #[test]
    fn test_flags() {
        let mut registry = ExtensionRegistry::new();
        registry.insert(record("juno", &["house", "techno"]));
        registry.insert(record("other", &[]));

        assert_eq!(registry.enabled().count(), 0);
        registry.set_enabled(&id("juno"), true).expect("known extension");
        registry
            .set_genre_enabled(&id("juno"), "Techno", false)
            .expect("known genre");

        let enabled: Vec<_> = registry.enabled().map(|r| r.id.as_str()).collect();
        assert_eq!(enabled, vec!["juno"]);
        assert!(!registry.get(&id("juno")).expect("present").is_genre_enabled("techno"));

        assert!(registry.set_enabled(&id("missing"), true).is_err());
        assert!(registry.set_genre_enabled(&id("juno"), "trance", true).is_err());
    }

    #[test]
    fn test_settings_round_trip() {
        let mut registry = ExtensionRegistry::new();
        registry.insert(record("juno", &["house", "techno"]));
        registry.set_enabled(&id("juno"), true).expect("known extension");
        registry
            .set_genre_enabled(&id("juno"), "house", false)
            .expect("known genre");

        let exported = registry.export_settings();

        let mut fresh = ExtensionRegistry::new();
        fresh.insert(record("juno", &["house", "techno"]));
        fresh.insert(record("new", &[]));
        fresh.apply_settings(&exported);

        let juno = fresh.get(&id("juno")).expect("present");
        assert!(juno.enabled);
        assert!(!juno.is_genre_enabled("house"));
        assert!(juno.is_genre_enabled("techno"));
        assert!(!fresh.get(&id("new")).expect("present").enabled);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut registry = ExtensionRegistry::new();
        registry.insert(record("a", &[]));
        let snapshot = registry.snapshot();

        registry.set_enabled(&id("a"), true).expect("known extension");
        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].enabled);
    }
}

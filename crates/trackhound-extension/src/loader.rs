//! Loading extension units.
//!
//! A loader lists the candidate units in the extensions directory and turns
//! one candidate into a [`ModuleHandle`]. Discovery decides what to do with
//! the module; loaders do no contract validation.

use crate::error::{ExtensionError, Result};
use crate::module::ModuleHandle;
use crate::recipe::RecipeModule;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use trackhound_core::ExtensionId;

/// Extension unit loader.
pub trait ExtensionLoader: Send + Sync {
    /// Identities of the candidate units in `dir`, sorted.
    fn candidates(&self, dir: &Path) -> Result<Vec<ExtensionId>>;

    /// Load the unit `id` from `dir`.
    fn load(&self, dir: &Path, id: &ExtensionId) -> Result<ModuleHandle>;
}

/// File extension of recipe units.
pub const RECIPE_EXTENSION: &str = "toml";

/// Loads declarative recipes: one `<id>.toml` file per extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipeLoader;

impl ExtensionLoader for RecipeLoader {
    fn candidates(&self, dir: &Path) -> Result<Vec<ExtensionId>> {
        let mut ids = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if !path.is_file()
                || path.extension().and_then(|s| s.to_str()) != Some(RECIPE_EXTENSION)
            {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match ExtensionId::new(stem) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping extension unit");
                }
            }
        }

        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn load(&self, dir: &Path, id: &ExtensionId) -> Result<ModuleHandle> {
        let path = dir.join(format!("{id}.{RECIPE_EXTENSION}"));

        let contents = std::fs::read_to_string(&path).map_err(|e| ExtensionError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        let table: toml::Table =
            toml::from_str(&contents).map_err(|source| ExtensionError::ParseError {
                path: path.display().to_string(),
                source,
            })?;

        debug!(extension = %id, path = %path.display(), "loaded recipe");

        Ok(Arc::new(RecipeModule::from_table(id.clone(), table)))
    }
}

/// Extensions compiled into the binary.
///
/// Registered modules are candidates regardless of the directory contents.
#[derive(Default, Clone)]
pub struct BuiltinLoader {
    modules: BTreeMap<ExtensionId, ModuleHandle>,
}

impl BuiltinLoader {
    /// Create an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `id`. A later registration replaces an earlier one.
    #[must_use]
    pub fn with(mut self, id: ExtensionId, module: ModuleHandle) -> Self {
        self.register(id, module);
        self
    }

    /// Register a module under `id`.
    pub fn register(&mut self, id: ExtensionId, module: ModuleHandle) {
        self.modules.insert(id, module);
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ExtensionLoader for BuiltinLoader {
    fn candidates(&self, _dir: &Path) -> Result<Vec<ExtensionId>> {
        Ok(self.modules.keys().cloned().collect())
    }

    fn load(&self, _dir: &Path, id: &ExtensionId) -> Result<ModuleHandle> {
        self.modules
            .get(id)
            .cloned()
            .ok_or_else(|| ExtensionError::NotFound { id: id.to_string() })
    }
}

/// Consults several loaders in order. The first loader to list an identity
/// owns it.
///
/// Owners are remembered from the last [`candidates`](ExtensionLoader::candidates)
/// call, so loading does not list the directory again.
#[derive(Default, Clone)]
pub struct ChainLoader {
    loaders: Vec<Arc<dyn ExtensionLoader>>,
    owners: Arc<Mutex<HashMap<ExtensionId, usize>>>,
}

impl ChainLoader {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a loader.
    #[must_use]
    pub fn with(mut self, loader: Arc<dyn ExtensionLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    fn owner(&self, dir: &Path, id: &ExtensionId) -> Option<&Arc<dyn ExtensionLoader>> {
        let known = self
            .owners
            .lock()
            .expect("acquire owners lock")
            .get(id)
            .copied();
        if let Some(index) = known {
            return self.loaders.get(index);
        }

        // Not listed by the last scan; ask each loader.
        self.loaders.iter().find(|loader| {
            loader
                .candidates(dir)
                .is_ok_and(|candidates| candidates.contains(id))
        })
    }
}

impl ExtensionLoader for ChainLoader {
    fn candidates(&self, dir: &Path) -> Result<Vec<ExtensionId>> {
        let mut owners = HashMap::new();
        for (index, loader) in self.loaders.iter().enumerate() {
            match loader.candidates(dir) {
                Ok(found) => {
                    for id in found {
                        owners.entry(id).or_insert(index);
                    }
                }
                Err(e) => warn!(dir = %dir.display(), error = %e, "loader failed to list candidates"),
            }
        }

        let mut ids: Vec<ExtensionId> = owners.keys().cloned().collect();
        ids.sort();
        *self.owners.lock().expect("acquire owners lock") = owners;
        Ok(ids)
    }

    fn load(&self, dir: &Path, id: &ExtensionId) -> Result<ModuleHandle> {
        self.owner(dir, id)
            .ok_or_else(|| ExtensionError::NotFound { id: id.to_string() })?
            .load(dir, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ExtensionModule, NativeModule};
    use tempfile::TempDir;

    fn id(name: &str) -> ExtensionId {
        ExtensionId::new(name).expect("valid id")
    }

    #[test]
    fn test_recipe_candidates_are_toml_files() {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::write(dir.path().join("Beatport.toml"), "").expect("write");
        std::fs::write(dir.path().join("Juno.toml"), "").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "").expect("write");
        std::fs::create_dir(dir.path().join("nested.toml")).expect("mkdir");

        let ids = RecipeLoader.candidates(dir.path()).expect("list candidates");
        assert_eq!(ids, vec![id("Beatport"), id("Juno")]);
    }

    #[test]
    fn test_recipe_load_errors() {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::write(dir.path().join("broken.toml"), "[trackhound\nname=").expect("write");

        assert!(matches!(
            RecipeLoader.load(dir.path(), &id("broken")),
            Err(ExtensionError::ParseError { .. })
        ));
        assert!(matches!(
            RecipeLoader.load(dir.path(), &id("missing")),
            Err(ExtensionError::LoadError { .. })
        ));
    }

    #[test]
    fn test_builtin_loader_ignores_directory() {
        let loader = BuiltinLoader::new().with(id("native"), NativeModule::new().named("N").into_handle());
        let dir = TempDir::new().expect("create temp dir");

        assert_eq!(loader.candidates(dir.path()).expect("list"), vec![id("native")]);
        assert!(loader.load(dir.path(), &id("native")).is_ok());
        assert!(matches!(
            loader.load(dir.path(), &id("other")),
            Err(ExtensionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_chain_loader_merges_candidates() {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::write(dir.path().join("recipe.toml"), "[trackhound]\nname = \"R\"").expect("write");

        let builtin = BuiltinLoader::new().with(id("native"), NativeModule::new().named("N").into_handle());
        let chain = ChainLoader::new()
            .with(Arc::new(builtin))
            .with(Arc::new(RecipeLoader));

        assert_eq!(
            chain.candidates(dir.path()).expect("list"),
            vec![id("native"), id("recipe")]
        );
        let recipe = chain.load(dir.path(), &id("recipe")).expect("load recipe");
        assert!(recipe.metadata().is_some());
    }

    struct CountingLoader {
        ids: Vec<ExtensionId>,
        listed: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl ExtensionLoader for CountingLoader {
        fn candidates(&self, _dir: &Path) -> Result<Vec<ExtensionId>> {
            self.listed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(self.ids.clone())
        }

        fn load(&self, _dir: &Path, id: &ExtensionId) -> Result<ModuleHandle> {
            Ok(NativeModule::new().named(id.as_str()).into_handle())
        }
    }

    #[test]
    fn test_chain_loader_lists_once_per_scan() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = TempDir::new().expect("create temp dir");
        let listed = Arc::new(AtomicUsize::new(0));
        let counting = CountingLoader {
            ids: vec![id("a"), id("b"), id("c")],
            listed: listed.clone(),
        };
        let shadowed = BuiltinLoader::new().with(id("b"), NativeModule::new().named("B").into_handle());
        let chain = ChainLoader::new()
            .with(Arc::new(counting))
            .with(Arc::new(shadowed));

        let ids = chain.candidates(dir.path()).expect("list");
        assert_eq!(ids, vec![id("a"), id("b"), id("c")]);
        assert_eq!(listed.load(Ordering::SeqCst), 1);

        for candidate in &ids {
            let module = chain.load(dir.path(), candidate).expect("load");
            let name = module
                .metadata()
                .and_then(|meta| meta.get("name"))
                .and_then(|name| name.as_str())
                .map(str::to_string);
            assert_eq!(name.as_deref(), Some(candidate.as_str()), "first loader owns {candidate}");
        }
        assert_eq!(listed.load(Ordering::SeqCst), 1, "loading reuses the listed owners");
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::emitters::{cgo::CgoPlugin, python::PythonPlugin};
use crate::error::CodegenError;
use crate::traits::{Plugin, PluginOptions};

/// Builds a configured plugin instance.
pub type PluginFactory = fn(&PluginOptions) -> Box<dyn Plugin>;

/// Name-keyed plugin factories.
///
/// Registration takes the write lock, lookups and listing take the read
/// lock. Registration is expected at startup only.
#[derive(Default)]
pub struct PluginRegistry {
    factories: RwLock<BTreeMap<String, PluginFactory>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.list())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `cgo` and `python` plugins.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register("cgo", CgoPlugin::factory);
        registry.register("python", PythonPlugin::factory);
        registry
    }

    /// Register a factory under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or already registered. Both are
    /// programming errors.
    pub fn register(&self, name: &str, factory: PluginFactory) {
        assert!(!name.is_empty(), "plugin name must not be empty");
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(name) {
            panic!("plugin already registered: {name}");
        }
        factories.insert(name.to_string(), factory);
    }

    /// Build the plugin registered under `name`.
    pub fn get(&self, name: &str, opts: &PluginOptions) -> Result<Box<dyn Plugin>, CodegenError> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied();
        match factory {
            Some(factory) => Ok(factory(opts)),
            None => Err(CodegenError::UnknownPlugin {
                name: name.to_string(),
                available: self.list(),
            }),
        }
    }

    /// All registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

/// The process-wide registry, populated with the built-in plugins on first
/// use.
pub fn global() -> &'static PluginRegistry {
    static REGISTRY: OnceLock<PluginRegistry> = OnceLock::new();
    REGISTRY.get_or_init(PluginRegistry::with_builtin)
}

//! Plugin-based store registry
//!
//! The registry maps store type names to factories so the daemon can build
//! a record store from configuration without hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use intake_core::registry::StoreRegistry;
//! use intake_core::config::StoreConfig;
//!
//! let registry = StoreRegistry::with_builtin_stores();
//! let store = registry.create_store(&StoreConfig::File { path: "user_data.json".into() })?;
//! ```
//!
//! ## Registration
//!
//! Out-of-tree stores register under their own name and are selected with
//! `StoreConfig::Custom { factory, .. }`:
//!
//! ```rust,ignore
//! registry.register_store("sqlite", Box::new(SqliteStoreFactory));
//! ```

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::{FileRecordStoreFactory, MemoryRecordStoreFactory};
use crate::traits::{RecordStore, RecordStoreFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// Store registry for plugin-based record store creation
#[derive(Default)]
pub struct StoreRegistry {
    /// Registered record store factories
    stores: HashMap<String, Box<dyn RecordStoreFactory>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `file` and `memory` stores registered
    pub fn with_builtin_stores() -> Self {
        let mut registry = Self::new();
        registry.register_store("file", Box::new(FileRecordStoreFactory));
        registry.register_store("memory", Box::new(MemoryRecordStoreFactory));
        registry
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&mut self, name: impl Into<String>, factory: Box<dyn RecordStoreFactory>) {
        self.stores.insert(name.into(), factory);
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn RecordStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
        config.validate()?;

        let store_type = config.type_name();
        let factory = self
            .stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config)
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStoreFactory;

    impl RecordStoreFactory for MockStoreFactory {
        fn create(&self, _config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
            Err(Error::storage("Mock store not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let mut registry = StoreRegistry::new();

        // Initially empty
        assert!(!registry.has_store("mock"));

        registry.register_store("mock", Box::new(MockStoreFactory));

        assert!(registry.has_store("mock"));
        assert!(registry.list_stores().contains(&"mock".to_string()));
    }

    #[test]
    fn test_builtin_stores() {
        let registry = StoreRegistry::with_builtin_stores();
        assert!(registry.has_store("file"));
        assert!(registry.has_store("memory"));

        let store = registry.create_store(&StoreConfig::Memory).unwrap();
        assert_eq!(store.descriptor(), "memory");

        let store = registry
            .create_store(&StoreConfig::File {
                path: "user_data.json".to_string(),
            })
            .unwrap();
        assert_eq!(store.descriptor(), "tabular-file");
    }

    #[test]
    fn test_unknown_custom_store() {
        let registry = StoreRegistry::with_builtin_stores();
        let config = StoreConfig::Custom {
            factory: "sqlite".to_string(),
            config: serde_json::json!({ "url": "sqlite://intake.db" }),
        };
        assert!(matches!(registry.create_store(&config), Err(Error::Config(_))));
    }
}

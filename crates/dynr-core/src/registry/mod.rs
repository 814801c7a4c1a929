//! Plugin-based store registry
//!
//! The registry maps store type names to factories so that record and secret
//! stores can be selected from configuration without hardcoded if-else
//! chains in the daemon.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dynr_core::registry::StoreRegistry;
//!
//! let registry = StoreRegistry::with_builtins();
//! dynr_store_cloudflare::register(&registry);
//!
//! let records = registry.create_record_store(&config.record_store).await?;
//! let secrets = registry.create_secret_store(&config.secret_store)?;
//! ```
//!
//! ## Registration
//!
//! Store crates register themselves during initialization:
//!
//! ```rust,ignore
//! pub fn register(registry: &StoreRegistry) {
//!     registry.register_record_store("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{RecordStoreConfig, SecretStoreConfig};
use crate::error::{Error, Result};
use crate::secrets::{EnvSecretStoreFactory, FileSecretStoreFactory};
use crate::store::{FileRecordStoreFactory, MemoryRecordStoreFactory};
use crate::traits::{RecordStore, RecordStoreFactory, SecretStore, SecretStoreFactory};

/// Registry of record store and secret store factories
///
/// ## Thread Safety
///
/// Interior mutability through `RwLock`: concurrent reads, exclusive writes.
/// A poisoned lock is recovered; the maps are never left half-updated.
#[derive(Default)]
pub struct StoreRegistry {
    record_stores: RwLock<HashMap<String, Arc<dyn RecordStoreFactory>>>,
    secret_stores: RwLock<HashMap<String, Arc<dyn SecretStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in stores registered
    ///
    /// Record stores: `memory`, `file`. Secret stores: `env`, `file`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_record_store("memory", Box::new(MemoryRecordStoreFactory));
        registry.register_record_store("file", Box::new(FileRecordStoreFactory));
        registry.register_secret_store("env", Box::new(EnvSecretStoreFactory));
        registry.register_secret_store("file", Box::new(FileSecretStoreFactory));
        registry
    }

    /// Register a record store factory under a type name
    pub fn register_record_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RecordStoreFactory>,
    ) {
        let mut stores = self
            .record_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Register a secret store factory under a type name
    pub fn register_secret_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn SecretStoreFactory>,
    ) {
        let mut stores = self
            .secret_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn RecordStore>)`: Created store
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_record_store(
        &self,
        config: &RecordStoreConfig,
    ) -> Result<Arc<dyn RecordStore>> {
        let store_type = config.type_name();

        // Clone the factory out so the lock is not held across the await
        let factory = self
            .record_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown record store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// Create a secret store from configuration
    pub fn create_secret_store(&self, config: &SecretStoreConfig) -> Result<Arc<dyn SecretStore>> {
        let store_type = config.type_name();
        let stores = self
            .secret_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown secret store type: {}", store_type)))?;

        factory.create(config)
    }

    /// List registered record store types (sorted)
    pub fn list_record_stores(&self) -> Vec<String> {
        let stores = self
            .record_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// List registered secret store types (sorted)
    pub fn list_secret_stores(&self) -> Vec<String> {
        let stores = self
            .secret_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a record store type is registered
    pub fn has_record_store(&self, name: &str) -> bool {
        self.record_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Check if a secret store type is registered
    pub fn has_secret_store(&self, name: &str) -> bool {
        self.secret_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

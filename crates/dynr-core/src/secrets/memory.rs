// # Static Secret Store
//
// Secrets held in memory. Used by tests and by embedders that load the
// credential themselves.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::Error;
use crate::traits::SecretStore;

/// In-memory secret store that counts lookups
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    secrets: RwLock<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl StaticSecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_secret(self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(id, value);
        self
    }

    /// Set a secret
    pub fn insert(&self, id: impl Into<String>, value: impl Into<String>) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), value.into());
    }

    /// Remove a secret
    pub fn remove(&self, id: &str) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Number of `get_secret` calls so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, id: &str) -> Result<Option<String>, Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn store_name(&self) -> &'static str {
        "static"
    }
}

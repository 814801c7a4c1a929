// # Environment Secret Store
//
// Resolves a secret identifier to an environment variable:
// `dynr/users/admin` → `DYNR_USERS_ADMIN`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::Error;
use crate::config::SecretStoreConfig;
use crate::traits::{SecretStore, SecretStoreFactory};

/// Secret store backed by environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    /// Create an environment secret store
    pub fn new() -> Self {
        Self
    }

    /// Environment variable name for a secret identifier
    ///
    /// ASCII letters are uppercased, digits kept, everything else becomes `_`.
    pub fn var_name(id: &str) -> String {
        id.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, id: &str) -> Result<Option<String>, Error> {
        let var = Self::var_name(id);
        match std::env::var(&var) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(Error::secret_store(format!(
                "Environment variable {} is not valid UTF-8",
                var
            ))),
        }
    }

    fn store_name(&self) -> &'static str {
        "env"
    }
}

/// Factory for `env` secret stores
pub struct EnvSecretStoreFactory;

impl SecretStoreFactory for EnvSecretStoreFactory {
    fn create(&self, config: &SecretStoreConfig) -> Result<Arc<dyn SecretStore>, Error> {
        match config {
            SecretStoreConfig::Env => Ok(Arc::new(EnvSecretStore::new())),
            other => Err(Error::config(format!(
                "env factory cannot build a '{}' secret store",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_name_mapping() {
        assert_eq!(EnvSecretStore::var_name("dynr/users/admin"), "DYNR_USERS_ADMIN");
        assert_eq!(EnvSecretStore::var_name("my-app.secret"), "MY_APP_SECRET");
    }

    #[tokio::test]
    async fn test_missing_variable_is_none() {
        let store = EnvSecretStore::new();
        let secret = store
            .get_secret("dynr/tests/definitely-not-set-4c1f")
            .await
            .unwrap();
        assert_eq!(secret, None);
    }
}

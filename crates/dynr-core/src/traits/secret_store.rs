// # Secret Store Trait
//
// Read-only access to deployment secrets (the admin credential).
//
// ## Implementations
//
// - Environment variables: `dynr_core::secrets::EnvSecretStore`
// - JSON files: `dynr_core::secrets::FileSecretStore`
// - Fixed values (tests, embedding): `dynr_core::secrets::StaticSecretStore`

use async_trait::async_trait;
use std::sync::Arc;

/// Trait for secret store implementations
///
/// The core never writes secrets; a store that cannot find an identifier
/// returns `Ok(None)` rather than an error.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Look up a secret by identifier (e.g. "dynr/users/admin")
    async fn get_secret(&self, id: &str) -> Result<Option<String>, crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing secret stores from configuration
pub trait SecretStoreFactory: Send + Sync {
    /// Create a SecretStore instance from configuration
    fn create(
        &self,
        config: &crate::config::SecretStoreConfig,
    ) -> Result<Arc<dyn SecretStore>, crate::Error>;
}

//! Credential Verifier
//!
//! Exactly one credential is valid per deployment: the configured username
//! and the password held by the secret store. Verification hashes both sides
//! and compares digests in constant time, so the time taken does not depend
//! on the secret's length or on how much of it the caller got right.

use constant_time_eq::constant_time_eq;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::config::AuthConfig;
use crate::error::Result;
use crate::traits::SecretStore;

/// The stored credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    secret: String,
}

impl Credential {
    /// Create a credential
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// The accepted username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Build a credential from a secret store payload
    ///
    /// The payload is either a JSON object carrying a `password` field or
    /// the raw password. A raw password loses only one trailing line ending;
    /// other whitespace is part of the password. Returns `None` when no
    /// usable password is present.
    pub fn from_secret_payload(username: impl Into<String>, payload: &str) -> Option<Self> {
        #[derive(Deserialize)]
        struct SecretPayload {
            password: Option<String>,
        }

        let trimmed = payload.trim();
        let password = if trimmed.starts_with('{') {
            serde_json::from_str::<SecretPayload>(trimmed).ok()?.password?
        } else {
            strip_line_ending(payload).to_string()
        };

        if password.is_empty() {
            return None;
        }

        Some(Self::new(username, password))
    }
}

fn strip_line_ending(raw: &str) -> &str {
    raw.strip_suffix("\r\n")
        .or_else(|| raw.strip_suffix('\n'))
        .unwrap_or(raw)
}

// Custom Debug implementation that hides the secret
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Credentials presented by the caller (HTTP Basic authentication)
#[derive(Clone)]
pub struct ClientCredentials {
    /// Presented username
    pub username: String,
    /// Presented password
    pub password: String,
}

impl ClientCredentials {
    /// Create client credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Check a presented username/secret pair against the stored credential
///
/// `true` only if both match exactly (case-sensitive). A missing stored
/// credential rejects everything. Never panics.
pub fn verify(provided_username: &str, provided_secret: &str, stored: Option<&Credential>) -> bool {
    let (expected_username, expected_secret) = match stored {
        Some(credential) => (credential.username.as_str(), credential.secret.as_str()),
        None => ("", ""),
    };

    // Both comparisons always run; `&` does not short-circuit.
    let username_ok = digest_eq(provided_username, expected_username);
    let secret_ok = digest_eq(provided_secret, expected_secret);

    stored.is_some() & username_ok & secret_ok
}

fn digest_eq(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    constant_time_eq(provided.as_slice(), expected.as_slice())
}

/// Loads the stored credential from the secret store
///
/// With caching enabled, the first credential successfully loaded is kept
/// for the process lifetime. A missing secret is never cached, so fixing the
/// secret store takes effect without a restart.
pub struct CredentialSource {
    secrets: Arc<dyn SecretStore>,
    secret_id: String,
    username: String,
    cache: Option<OnceCell<Credential>>,
}

impl CredentialSource {
    /// Create a credential source from the auth configuration
    pub fn new(secrets: Arc<dyn SecretStore>, config: &AuthConfig) -> Self {
        Self {
            secrets,
            secret_id: config.secret_id.clone(),
            username: config.username.clone(),
            cache: config.cache_secret.then(OnceCell::new),
        }
    }

    /// Load the stored credential
    ///
    /// - `Ok(Some(_))`: credential available
    /// - `Ok(None)`: secret missing or unusable (every caller is rejected)
    /// - `Err(_)`: the secret store itself failed
    pub async fn load(&self) -> Result<Option<Credential>> {
        if let Some(cached) = self.cache.as_ref().and_then(OnceCell::get) {
            return Ok(Some(cached.clone()));
        }

        let payload = self.secrets.get_secret(&self.secret_id).await?;
        let credential = payload
            .as_deref()
            .and_then(|payload| Credential::from_secret_payload(self.username.clone(), payload));

        match &credential {
            Some(credential) => {
                debug!(
                    "Loaded credential '{}' from {} secret store",
                    self.secret_id,
                    self.secrets.store_name()
                );
                if let Some(cache) = &self.cache {
                    let _ = cache.set(credential.clone());
                }
            }
            None => {
                error!(
                    "Secret '{}' is missing or has no password in the {} secret store; rejecting all credentials",
                    self.secret_id,
                    self.secrets.store_name()
                );
            }
        }

        Ok(credential)
    }

    /// Authenticate presented credentials
    ///
    /// Absent credentials are rejected without consulting the secret store.
    pub async fn authenticate(&self, presented: Option<&ClientCredentials>) -> Result<bool> {
        let Some(presented) = presented else {
            return Ok(false);
        };

        let stored = self.load().await?;
        Ok(verify(
            &presented.username,
            &presented.password,
            stored.as_ref(),
        ))
    }
}

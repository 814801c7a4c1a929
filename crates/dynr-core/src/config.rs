//! Configuration types for dynr
//!
//! This module defines all configuration structures used throughout the crate.
//! A `DynrConfig` is loaded once, validated, and then treated as immutable.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::allowlist::{APEX_ALIAS, is_valid_hostname, is_valid_record_name, normalize_name};

/// Main dynr configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynrConfig {
    /// Allow-list: zone name → records that may be updated
    pub allowed_zones: BTreeMap<String, ZoneConfig>,

    /// Qualified hostnames that are refused with `abuse`
    #[serde(default)]
    pub blocked_hostnames: Vec<String>,

    /// Credential settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Update request settings
    #[serde(default)]
    pub update: UpdateConfig,

    /// Record store retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Record store backend
    #[serde(default)]
    pub record_store: RecordStoreConfig,

    /// Secret store backend
    #[serde(default)]
    pub secret_store: SecretStoreConfig,
}

impl DynrConfig {
    /// Create a configuration for the given allow-list with defaults elsewhere
    pub fn new(allowed_zones: BTreeMap<String, ZoneConfig>) -> Self {
        Self {
            allowed_zones,
            blocked_hostnames: Vec::new(),
            auth: AuthConfig::default(),
            update: UpdateConfig::default(),
            retry: RetryConfig::default(),
            record_store: RecordStoreConfig::default(),
            secret_store: SecretStoreConfig::default(),
        }
    }

    /// Parse the allow-list from its JSON form
    ///
    /// ```json
    /// { "example.com": { "allowed_records": ["vpn", "@"] } }
    /// ```
    pub fn parse_allowed_zones(json: &str) -> Result<BTreeMap<String, ZoneConfig>, crate::Error> {
        serde_json::from_str(json)
            .map_err(|e| crate::Error::config(format!("Invalid allowed zones JSON: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.allowed_zones.is_empty() {
            return Err(crate::Error::config("No allowed zones configured"));
        }

        let mut seen = HashSet::new();
        for (zone, zone_config) in &self.allowed_zones {
            if !is_valid_hostname(zone.trim_end_matches('.')) {
                return Err(crate::Error::config(format!("Invalid zone name: '{}'", zone)));
            }
            let key = normalize_name(zone);
            if seen.contains(&key) {
                return Err(crate::Error::config(format!(
                    "Zone '{}' is configured more than once",
                    key
                )));
            }
            seen.insert(key);
            zone_config.validate(zone)?;
        }

        for hostname in &self.blocked_hostnames {
            if !is_valid_hostname(hostname.trim_end_matches('.')) {
                return Err(crate::Error::config(format!(
                    "Invalid blocked hostname: '{}'",
                    hostname
                )));
            }
        }

        self.auth.validate()?;
        self.update.validate()?;
        self.retry.validate()?;
        self.record_store.validate()?;
        self.secret_store.validate()?;

        Ok(())
    }
}

/// Allow-list entry for a single zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Record names relative to the zone; `@` or `""` is the apex
    pub allowed_records: Vec<String>,
}

impl ZoneConfig {
    /// Create a zone entry from record names
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_records: records.into_iter().map(Into::into).collect(),
        }
    }

    fn validate(&self, zone: &str) -> Result<(), crate::Error> {
        if self.allowed_records.is_empty() {
            return Err(crate::Error::config(format!(
                "Zone '{}' has no allowed records",
                zone
            )));
        }

        for record in &self.allowed_records {
            if record.is_empty() || record == APEX_ALIAS {
                continue;
            }
            if !is_valid_record_name(record) {
                return Err(crate::Error::config(format!(
                    "Zone '{}' has an invalid record name: '{}'",
                    zone, record
                )));
            }
        }

        Ok(())
    }
}

/// Credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// The single accepted username
    #[serde(default = "default_username")]
    pub username: String,

    /// Identifier of the secret holding the password
    #[serde(default = "default_secret_id")]
    pub secret_id: String,

    /// Keep the first loaded credential for the process lifetime
    #[serde(default = "default_true")]
    pub cache_secret: bool,
}

impl AuthConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.username.is_empty() {
            return Err(crate::Error::config("Username cannot be empty"));
        }
        if self.username.contains(':') {
            return Err(crate::Error::config(
                "Username cannot contain ':' (not representable in Basic authentication)",
            ));
        }
        if self.secret_id.is_empty() {
            return Err(crate::Error::config("Secret identifier cannot be empty"));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            secret_id: default_secret_id(),
            cache_secret: true,
        }
    }
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_secret_id() -> String {
    "dynr/users/admin".to_string()
}

fn default_true() -> bool {
    true
}

/// Update request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// TTL written with every upsert (seconds)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Maximum number of comma-separated hostnames per request
    #[serde(default = "default_max_hostnames")]
    pub max_hostnames: usize,

    /// Use `X-Forwarded-For` when the request carries no address
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,
}

impl UpdateConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        if self.max_hostnames == 0 {
            return Err(crate::Error::config("Maximum hostnames per request must be > 0"));
        }
        Ok(())
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            max_hostnames: default_max_hostnames(),
            trust_forwarded_for: true,
        }
    }
}

fn default_ttl() -> u32 {
    60
}

fn default_max_hostnames() -> usize {
    20
}

/// Retry policy for record store calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (transient failures only)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Factor applied to the delay after each retry
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,

    /// Deadline for a single store call (milliseconds)
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl RetryConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "max_retries must be between 0 and 10. Got: {}",
                self.max_retries
            )));
        }
        if self.backoff_multiplier == 0 {
            return Err(crate::Error::config("backoff_multiplier must be >= 1"));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(crate::Error::config("attempt_timeout_ms must be > 0"));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

fn default_max_retries() -> usize {
    2
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_backoff_multiplier() -> u32 {
    4
}

fn default_attempt_timeout_ms() -> u64 {
    5_000
}

/// Record store configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordStoreConfig {
    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// JSON file store
    File {
        /// Path to the record file
        path: String,
    },

    /// Cloudflare DNS API
    Cloudflare {
        /// API token with Zone:DNS:Edit permission
        api_token: String,
        /// Optional zone name → zone ID map (skips zone lookups)
        #[serde(default)]
        zone_ids: BTreeMap<String, String>,
    },

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RecordStoreConfig {
    /// Validate the record store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RecordStoreConfig::Memory => Ok(()),
            RecordStoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Record store path cannot be empty"));
                }
                Ok(())
            }
            RecordStoreConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            RecordStoreConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom record store factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            RecordStoreConfig::Memory => "memory",
            RecordStoreConfig::File { .. } => "file",
            RecordStoreConfig::Cloudflare { .. } => "cloudflare",
            RecordStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

// Custom Debug implementation that hides the API token
impl fmt::Debug for RecordStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStoreConfig::Memory => f.write_str("Memory"),
            RecordStoreConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            RecordStoreConfig::Cloudflare { zone_ids, .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("zone_ids", zone_ids)
                .finish(),
            RecordStoreConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// Secret store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretStoreConfig {
    /// Environment variables (`dynr/users/admin` → `DYNR_USERS_ADMIN`)
    #[default]
    Env,

    /// One JSON or plain-text file per secret under a directory
    File {
        /// Base directory
        dir: String,
    },

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SecretStoreConfig {
    /// Validate the secret store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SecretStoreConfig::Env => Ok(()),
            SecretStoreConfig::File { dir } => {
                if dir.is_empty() {
                    return Err(crate::Error::config("Secret store directory cannot be empty"));
                }
                Ok(())
            }
            SecretStoreConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom secret store factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            SecretStoreConfig::Env => "env",
            SecretStoreConfig::File { .. } => "file",
            SecretStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

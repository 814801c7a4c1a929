//! Error types for dynr
//!
//! This module defines the crate-wide error type. Request-level rejections
//! (malformed query, unauthorized record, failed mutation) have their own
//! types next to the component that produces them.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for dynr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dynr
#[derive(Error, Debug)]
pub enum Error {
    /// Record store-related errors (permanent unless stated otherwise)
    #[error("Record store error: {0}")]
    RecordStore(String),

    /// Secret store-related errors
    #[error("Secret store error: {0}")]
    SecretStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failures talking to an upstream API
    #[error("HTTP error: {0}")]
    Http(String),

    /// Upstream rejected our credentials or lacks permission
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Upstream throttling
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Upstream temporarily unavailable (5xx and friends)
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// A single upstream call exceeded its deadline
    #[error("Upstream call timed out after {0:?}")]
    Timeout(Duration),

    /// Zone or record not found upstream
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (bad record value, mismatched family, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store-specific error
    #[error("Store error ({store}): {message}")]
    Store {
        /// Store name
        store: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a record store error
    pub fn record_store(msg: impl Into<String>) -> Self {
        Self::RecordStore(msg.into())
    }

    /// Create a secret store error
    pub fn secret_store(msg: impl Into<String>) -> Self {
        Self::SecretStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP transport error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an upstream-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a store-specific error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Whether a retry of the same call may succeed
    ///
    /// Network blips, throttling, upstream 5xx and timeouts are transient.
    /// Everything else (bad values, missing zones, denied permissions,
    /// local faults) is permanent and must not be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::RateLimited(_) | Self::Unavailable(_) | Self::Timeout(_)
        )
    }
}

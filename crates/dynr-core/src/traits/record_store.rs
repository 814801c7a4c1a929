// # Record Store Trait
//
// Defines the interface to the authoritative DNS record store.
//
// ## Implementations
//
// - In-memory: `dynr_core::store::MemoryRecordStore`
// - JSON file: `dynr_core::store::FileRecordStore`
// - Cloudflare: `dynr-store-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dynr_core::traits::{RecordStore, RecordType, ZoneRecord};
//
// let current = store.get_record("example.com", "vpn", RecordType::A).await?;
//
// let record = ZoneRecord::new("example.com", "vpn", RecordType::A, values, 60);
// store.upsert_record(&record).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Address record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// The record type that holds the given address
    pub fn for_addr(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Whether an address belongs in a record of this type
    pub fn accepts(&self, addr: &IpAddr) -> bool {
        Self::for_addr(addr) == *self
    }

    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An address record set as held by the record store
///
/// `name` is relative to `zone`; the empty string is the zone apex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Zone name (e.g. "example.com")
    pub zone: String,
    /// Record name relative to the zone (e.g. "vpn", "" for the apex)
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Address values, deduplicated and ordered
    pub values: BTreeSet<IpAddr>,
    /// Time-to-live in seconds
    pub ttl: u32,
}

impl ZoneRecord {
    /// Create a new record set
    pub fn new(
        zone: impl Into<String>,
        name: impl Into<String>,
        record_type: RecordType,
        values: impl IntoIterator<Item = IpAddr>,
        ttl: u32,
    ) -> Self {
        Self {
            zone: zone.into(),
            name: name.into(),
            record_type,
            values: values.into_iter().collect(),
            ttl,
        }
    }

    /// Fully qualified record name (without trailing dot)
    pub fn fqdn(&self) -> String {
        fqdn(&self.zone, &self.name)
    }
}

/// Join a relative record name and its zone
pub fn fqdn(zone: &str, name: &str) -> String {
    if name.is_empty() {
        zone.to_string()
    } else {
        format!("{}.{}", name, zone)
    }
}

/// Trait for record store implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - Stores are **single-shot**: one logical operation per call, no retry,
///   no backoff. Retry policy and timeouts are owned by `RecordMutator`.
/// - Stores never cache records across calls.
/// - `upsert_record` replaces the whole value set of `(zone, name, type)`
///   and must be idempotent: repeating an identical upsert is not an error
///   and leaves the same state.
/// - Errors must be classified so that `Error::is_transient()` is true only
///   for failures a retry may fix (transport, throttling, 5xx).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the current record set, `Ok(None)` if it does not exist
    async fn get_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ZoneRecord>, crate::Error>;

    /// Create the record set or replace its values and TTL
    async fn upsert_record(&self, record: &ZoneRecord) -> Result<(), crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
#[async_trait]
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::RecordStoreConfig,
    ) -> Result<Arc<dyn RecordStore>, crate::Error>;
}

// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// A zone store that lives only as long as the process. Useful for tests,
// demos, and for running the endpoint in front of nothing while wiring up
// routers.
//
// ## Crash Behavior
//
// - All records are lost on restart
// - No recovery possible

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::Error;
use crate::config::RecordStoreConfig;
use crate::traits::{RecordStore, RecordStoreFactory, RecordType, ZoneRecord};

type RecordKey = (String, String, RecordType);

/// In-memory record store
///
/// Clones share the same records.
///
/// # Example
///
/// ```rust,no_run
/// use dynr_core::store::MemoryRecordStore;
/// use dynr_core::traits::{RecordStore, RecordType, ZoneRecord};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///
///     let record = ZoneRecord::new("example.com", "vpn", RecordType::A, ["203.0.113.5".parse()?], 60);
///     store.upsert_record(&record).await?;
///
///     let current = store.get_record("example.com", "vpn", RecordType::A).await?;
///     assert_eq!(current, Some(record));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<HashMap<RecordKey, ZoneRecord>>>,
}

impl MemoryRecordStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = ZoneRecord>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.inner.write().unwrap_or_else(PoisonError::into_inner);
            for record in records {
                guard.insert(key(&record.zone, &record.name, record.record_type), record);
            }
        }
        store
    }

    /// Number of record sets held
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a record set exists
    pub fn contains(&self, zone: &str, name: &str, record_type: RecordType) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key(zone, name, record_type))
    }

    /// All records, ordered by zone, name and type
    pub fn records(&self) -> Vec<ZoneRecord> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<ZoneRecord> = guard.values().cloned().collect();
        records.sort_by(|a, b| {
            (&a.zone, &a.name, a.record_type).cmp(&(&b.zone, &b.name, b.record_type))
        });
        records
    }
}

fn key(zone: &str, name: &str, record_type: RecordType) -> RecordKey {
    (zone.to_string(), name.to_string(), record_type)
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ZoneRecord>, Error> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(&key(zone, name, record_type)).cloned())
    }

    async fn upsert_record(&self, record: &ZoneRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(
            key(&record.zone, &record.name, record.record_type),
            record.clone(),
        );
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for `memory` record stores
pub struct MemoryRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for MemoryRecordStoreFactory {
    async fn create(&self, config: &RecordStoreConfig) -> Result<Arc<dyn RecordStore>, Error> {
        match config {
            RecordStoreConfig::Memory => Ok(Arc::new(MemoryRecordStore::new())),
            other => Err(Error::config(format!(
                "memory factory cannot build a '{}' record store",
                other.type_name()
            ))),
        }
    }
}

// # File Record Store
//
// JSON file implementation of RecordStore for single-host deployments that
// serve their zone from a file (or hand it to another tool).
//
// ## Crash Recovery
//
// - Atomic writes: every upsert writes a temp file, then renames it
// - Automatic backup: the previous file is kept as `.backup`
// - Recovery: a corrupted main file falls back to the backup
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "vpn.example.com/A": {
//       "zone": "example.com",
//       "name": "vpn",
//       "record_type": "A",
//       "values": ["203.0.113.5"],
//       "ttl": 60,
//       "updated_at": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::RecordStoreConfig;
use crate::traits::{RecordStore, RecordStoreFactory, RecordType, ZoneRecord};

/// Record file format version
const RECORD_FILE_VERSION: &str = "1.0";

/// File-backed record store
///
/// All records are held in memory and the whole file is rewritten on each
/// upsert. Writers are serialized, so the file always reflects the latest
/// completed upsert.
///
/// # Example
///
/// ```rust,no_run
/// use dynr_core::store::FileRecordStore;
/// use dynr_core::traits::{RecordStore, RecordType};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/dynr/records.json").await?;
///     let current = store.get_record("example.com", "vpn", RecordType::A).await?;
///     println!("{:?}", current);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

/// A record as persisted, with its last write time
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(flatten)]
    record: ZoneRecord,
    updated_at: DateTime<Utc>,
}

/// Serializable record file format
#[derive(Debug, Serialize, Deserialize)]
struct RecordFileFormat {
    version: String,
    records: BTreeMap<String, StoredRecord>,
}

fn record_key(zone: &str, name: &str, record_type: RecordType) -> String {
    format!("{}/{}", crate::traits::fqdn(zone, name), record_type)
}

impl FileRecordStore {
    /// Create or load a file record store
    ///
    /// Creates parent directories as needed. A missing file is an empty
    /// zone; a corrupted file is recovered from its backup when possible.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create record directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Number of record sets in the file
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the file holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Last write time of a record set
    pub async fn updated_at(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Option<DateTime<Utc>> {
        self.records
            .read()
            .await
            .get(&record_key(zone, name, record_type))
            .map(|stored| stored.updated_at)
    }

    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, StoredRecord>, Error> {
        match Self::load(path).await {
            Ok(records) => {
                tracing::debug!("Loaded {} record set(s) from {}", records.len(), path.display());
                Ok(records)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Record file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with an empty zone.");
                    return Ok(BTreeMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(records) => {
                        tracing::info!("Recovered {} record set(s) from backup", records.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore record file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(records)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with an empty zone.",
                            backup_err
                        );
                        Ok(BTreeMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<String, StoredRecord>, Error> {
        if !path.exists() {
            tracing::debug!("Record file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::record_store(format!(
                "Failed to read record file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: RecordFileFormat = serde_json::from_str(&content)?;

        if file.version != RECORD_FILE_VERSION {
            tracing::warn!(
                "Record file version mismatch: expected {}, got {}. Attempting to load anyway.",
                RECORD_FILE_VERSION,
                file.version
            );
        }

        Ok(file.records)
    }

    /// Write all records atomically (temp file, backup, rename)
    async fn persist(&self, records: &BTreeMap<String, StoredRecord>) -> Result<(), Error> {
        let file = RecordFileFormat {
            version: RECORD_FILE_VERSION.to_string(),
            records: records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::record_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::record_store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.sync_all().await.map_err(|e| {
                Error::record_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::record_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Record file written: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ZoneRecord>, Error> {
        let records = self.records.read().await;
        Ok(records
            .get(&record_key(zone, name, record_type))
            .map(|stored| stored.record.clone()))
    }

    async fn upsert_record(&self, record: &ZoneRecord) -> Result<(), Error> {
        // The write lock is held through persist so file writes stay ordered
        let mut records = self.records.write().await;

        let mut next = records.clone();
        next.insert(
            record_key(&record.zone, &record.name, record.record_type),
            StoredRecord {
                record: record.clone(),
                updated_at: Utc::now(),
            },
        );

        self.persist(&next).await?;
        *records = next;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for `file` record stores
pub struct FileRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for FileRecordStoreFactory {
    async fn create(&self, config: &RecordStoreConfig) -> Result<Arc<dyn RecordStore>, Error> {
        match config {
            RecordStoreConfig::File { path } => Ok(Arc::new(FileRecordStore::new(path).await?)),
            other => Err(Error::config(format!(
                "file factory cannot build a '{}' record store",
                other.type_name()
            ))),
        }
    }
}

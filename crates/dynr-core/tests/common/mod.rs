//! Test doubles and common utilities for contract tests
//!
//! The doubles wrap a real `MemoryRecordStore` and add call counting,
//! scripted failures, and artificial latency.

#![allow(dead_code)]

use async_trait::async_trait;
use dynr_core::secrets::StaticSecretStore;
use dynr_core::traits::{RecordStore, RecordType, SecretStore, ZoneRecord};
use dynr_core::{ClientCredentials, DynrConfig, Error, MemoryRecordStore, UpdateHandler, ZoneConfig};
use std::collections::{BTreeMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PASSWORD: &str = "correct horse battery staple";

/// A record store that counts calls and can fail on demand
#[derive(Default)]
pub struct ScriptedRecordStore {
    inner: MemoryRecordStore,
    get_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    upserted: Mutex<Vec<(String, RecordType)>>,
    get_failures: Mutex<VecDeque<Error>>,
    upsert_failures: Mutex<VecDeque<Error>>,
    upsert_delay: Mutex<Option<Duration>>,
}

impl ScriptedRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ZoneRecord>) -> Self {
        Self {
            inner: MemoryRecordStore::with_records(records),
            ..Self::default()
        }
    }

    /// Queue errors returned by the next upsert calls, in order
    pub fn fail_upserts(&self, errors: impl IntoIterator<Item = Error>) {
        self.upsert_failures.lock().unwrap().extend(errors);
    }

    /// Queue errors returned by the next read calls, in order
    pub fn fail_gets(&self, errors: impl IntoIterator<Item = Error>) {
        self.get_failures.lock().unwrap().extend(errors);
    }

    /// Delay every upsert by `delay` before applying it
    pub fn delay_upserts(&self, delay: Duration) {
        *self.upsert_delay.lock().unwrap() = Some(delay);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// `(fqdn, type)` of every upsert call, including failed ones
    pub fn upserted(&self) -> Vec<(String, RecordType)> {
        self.upserted.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<ZoneRecord> {
        self.inner.records()
    }

    pub fn values(&self, zone: &str, name: &str, record_type: RecordType) -> Vec<IpAddr> {
        self.records()
            .into_iter()
            .find(|r| r.zone == zone && r.name == name && r.record_type == record_type)
            .map(|r| r.values.into_iter().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for ScriptedRecordStore {
    async fn get_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ZoneRecord>, Error> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.get_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.get_record(zone, name, record_type).await
    }

    async fn upsert_record(&self, record: &ZoneRecord) -> Result<(), Error> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.upserted
            .lock()
            .unwrap()
            .push((record.fqdn(), record.record_type));

        let delay = *self.upsert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.upsert_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.upsert_record(record).await
    }

    fn store_name(&self) -> &'static str {
        "scripted"
    }
}

/// A secret store whose backend is down
pub struct BrokenSecretStore;

#[async_trait]
impl SecretStore for BrokenSecretStore {
    async fn get_secret(&self, _id: &str) -> Result<Option<String>, Error> {
        Err(Error::secret_store("connection refused"))
    }

    fn store_name(&self) -> &'static str {
        "broken"
    }
}

/// Allow-list `{ "example.com": ["vpn"] }` with fast retries
pub fn example_config() -> DynrConfig {
    let mut zones = BTreeMap::new();
    zones.insert("example.com".to_string(), ZoneConfig::new(["vpn"]));

    let mut config = DynrConfig::new(zones);
    config.retry.base_delay_ms = 1;
    config.retry.attempt_timeout_ms = 1_000;
    config
}

pub fn admin_secrets() -> Arc<StaticSecretStore> {
    Arc::new(StaticSecretStore::new().with_secret(
        "dynr/users/admin",
        format!(r#"{{"username": "admin", "password": "{}"}}"#, PASSWORD),
    ))
}

pub fn handler(config: &DynrConfig, store: Arc<ScriptedRecordStore>) -> UpdateHandler {
    UpdateHandler::new(config, store, admin_secrets()).expect("valid configuration")
}

pub fn admin() -> Option<ClientCredentials> {
    Some(ClientCredentials::new("admin", PASSWORD))
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid address")
}

//! Record Mutator
//!
//! The only component that talks to the record store. Every store call is
//! bounded by a per-attempt timeout; transient failures are retried with
//! exponential backoff, permanent failures are surfaced immediately.
//!
//! ## Retry Flow
//!
//! ```text
//! attempt 0 ──fail(transient)──▶ sleep(base) ──▶ attempt 1 ──fail──▶ sleep(base·m) ──▶ attempt 2
//!     │                                              │                                   │
//!     └──fail(permanent)──▶ DnsError                 └──ok──▶ Applied                    └──fail──▶ DnsError
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::{debug, error, info, warn};

use crate::config::RetryConfig;
use crate::error::Error;
use crate::traits::{RecordStore, RecordType, ZoneRecord};

/// Retry policy for store calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Factor applied to the delay after each retry
    pub multiplier: u32,
    /// Deadline for a single store call
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based): `base * multiplier^retry`
    pub fn delay_for(&self, retry: usize) -> Duration {
        let exponent = u32::try_from(retry).unwrap_or(u32::MAX);
        let factor = self.multiplier.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.backoff_multiplier,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }
}

/// A store operation that failed for good
#[derive(Debug, ThisError)]
#[error("{operation} {record_type} {fqdn} failed after {attempts} attempt(s): {source}")]
pub struct DnsError {
    /// "read" or "upsert"
    pub operation: &'static str,
    /// Fully qualified record name
    pub fqdn: String,
    /// Record type
    pub record_type: RecordType,
    /// Store calls made (0 when rejected locally)
    pub attempts: usize,
    /// Last error seen
    #[source]
    pub source: Error,
}

/// Successful upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Store calls made, including the successful one
    pub attempts: usize,
}

/// Retried, timed-out access to a `RecordStore`
#[derive(Clone)]
pub struct RecordMutator {
    store: Arc<dyn RecordStore>,
    policy: RetryPolicy,
}

impl RecordMutator {
    /// Create a mutator over a store
    pub fn new(store: Arc<dyn RecordStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Read the current record set
    pub async fn fetch(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ZoneRecord>, DnsError> {
        let fqdn = crate::traits::fqdn(zone, name);

        self.with_retry("read", &fqdn, record_type, || {
            self.store.get_record(zone, name, record_type)
        })
        .await
        .map(|(record, _)| record)
    }

    /// Replace the value set of `(zone, name, record_type)`
    ///
    /// Repeating an identical upsert is safe. An empty value set, or a value
    /// of the wrong address family, is rejected without calling the store.
    pub async fn upsert(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
        values: &BTreeSet<IpAddr>,
        ttl: u32,
    ) -> Result<Applied, DnsError> {
        let fqdn = crate::traits::fqdn(zone, name);
        let reject = |message: String| DnsError {
            operation: "upsert",
            fqdn: fqdn.clone(),
            record_type,
            attempts: 0,
            source: Error::invalid_input(message),
        };

        if values.is_empty() {
            return Err(reject("empty value set".to_string()));
        }
        if let Some(bad) = values.iter().find(|v| !record_type.accepts(v)) {
            return Err(reject(format!("{} is not valid in a {} record", bad, record_type)));
        }

        let record = ZoneRecord::new(zone, name, record_type, values.iter().copied(), ttl);

        let ((), attempts) = self
            .with_retry("upsert", &fqdn, record_type, || {
                self.store.upsert_record(&record)
            })
            .await?;

        info!(
            zone = %zone,
            record = %fqdn,
            record_type = %record_type,
            attempts,
            "Upserted {} {} -> {:?} via {}",
            record_type,
            fqdn,
            values,
            self.store.store_name()
        );

        Ok(Applied { attempts })
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        fqdn: &str,
        record_type: RecordType,
        mut call: F,
    ) -> Result<(T, usize), DnsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = match tokio::time::timeout(self.policy.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(self.policy.attempt_timeout)),
            };

            let err = match result {
                Ok(value) => {
                    debug!("{} {} {} succeeded on attempt {}", operation, record_type, fqdn, attempt);
                    return Ok((value, attempt));
                }
                Err(err) => err,
            };

            let retry = attempt - 1;
            if err.is_transient() && retry < self.policy.max_retries {
                let delay = self.policy.delay_for(retry);
                warn!(
                    record = %fqdn,
                    record_type = %record_type,
                    attempt,
                    "{} attempt {} failed ({}), retrying in {:?}",
                    operation,
                    attempt,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            error!(
                record = %fqdn,
                record_type = %record_type,
                attempts = attempt,
                transient = err.is_transient(),
                "{} failed via {}: {}",
                operation,
                self.store.store_name(),
                err
            );

            return Err(DnsError {
                operation,
                fqdn: fqdn.to_string(),
                record_type,
                attempts: attempt,
                source: err,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use tokio_test::{assert_err, assert_ok};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            multiplier: 4,
            attempt_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_for(usize::MAX) >= policy.delay_for(10));
    }

    #[tokio::test]
    async fn test_upsert_then_fetch() {
        let store = Arc::new(MemoryRecordStore::new());
        let mutator = RecordMutator::new(store, fast_policy());
        let values = BTreeSet::from(["203.0.113.5".parse::<IpAddr>().unwrap()]);

        let applied = assert_ok!(
            mutator
                .upsert("example.com", "vpn", RecordType::A, &values, 60)
                .await
        );
        assert_eq!(applied.attempts, 1);

        let record = mutator
            .fetch("example.com", "vpn", RecordType::A)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.values, values);
        assert_eq!(record.ttl, 60);
    }

    #[tokio::test]
    async fn test_empty_values_rejected_locally() {
        let store = Arc::new(MemoryRecordStore::new());
        let mutator = RecordMutator::new(store.clone(), fast_policy());

        let err = mutator
            .upsert("example.com", "vpn", RecordType::A, &BTreeSet::new(), 60)
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 0);
        assert!(matches!(err.source, Error::InvalidInput(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_family_mismatch_rejected_locally() {
        let store = Arc::new(MemoryRecordStore::new());
        let mutator = RecordMutator::new(store.clone(), fast_policy());
        let values = BTreeSet::from(["2001:db8::1".parse::<IpAddr>().unwrap()]);

        let err = assert_err!(
            mutator
                .upsert("example.com", "vpn", RecordType::A, &values, 60)
                .await
        );

        assert_eq!(err.attempts, 0);
        assert!(store.is_empty());
    }
}

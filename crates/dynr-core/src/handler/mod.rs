//! Request Handler
//!
//! The `UpdateHandler` sequences every component for one update call and
//! maps each failure to exactly one Dyndns2 outcome.
//!
//! ## Flow
//!
//! ```text
//! UpdateQuery
//!     │
//!     ▼
//! ┌──────────────┐  denied   badauth
//! │ Authenticate │─────────▶ (store fault: dnserr)
//! └──────────────┘
//!     │
//!     ▼
//! ┌──────────┐  err   numhost
//! │  Parse   │──────▶
//! └──────────┘
//!     │
//!     ▼   per hostname, stop at first failure
//! ┌─────────┐   ┌───────────┐   ┌────────┐   ┌────────┐
//! │ Blocked │──▶│ Authorize │──▶│ Detect │──▶│ Mutate │──▶ good / nochg
//! └─────────┘   └───────────┘   └────────┘   └────────┘
//!   abuse          nohost         dnserr        dnserr
//! ```
//!
//! ## Cancellation
//!
//! Upserts run on a spawned task. If the caller drops the `handle` future
//! (client disconnect, server shutdown) the in-flight write still completes;
//! the upsert is idempotent, so a client retry is harmless either way.

use std::collections::{BTreeSet, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::allowlist::{Allowlist, normalize_name};
use crate::auth::{ClientCredentials, CredentialSource};
use crate::config::{DynrConfig, UpdateConfig};
use crate::detector::detect;
use crate::error::Result;
use crate::mutator::{RecordMutator, RetryPolicy};
use crate::protocol::{Addresses, Reply, UpdateOutcome, render, render_batch};
use crate::request::{UpdateQuery, UpdateRequest};
use crate::traits::{RecordStore, RecordType, SecretStore};

/// Result of checking presented credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Credentials match the stored credential
    Granted,
    /// Credentials absent or wrong
    Denied,
    /// The secret store could not be consulted
    Unavailable,
}

/// Orchestrates one Dyndns2 update call
///
/// Cheap to clone; all state is shared and immutable apart from the
/// write-once credential cache.
#[derive(Clone)]
pub struct UpdateHandler {
    inner: Arc<Inner>,
}

struct Inner {
    allowlist: Allowlist,
    blocked: HashSet<String>,
    credentials: CredentialSource,
    mutator: RecordMutator,
    update: UpdateConfig,
}

impl UpdateHandler {
    /// Create a handler from validated configuration and store handles
    pub fn new(
        config: &DynrConfig,
        record_store: Arc<dyn RecordStore>,
        secret_store: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        config.validate()?;

        let allowlist = Allowlist::new(&config.allowed_zones);
        info!(
            "Update handler ready: {} zone(s), {} blocked hostname(s), record store {}, secret store {}",
            allowlist.zone_count(),
            config.blocked_hostnames.len(),
            record_store.store_name(),
            secret_store.store_name()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                allowlist,
                blocked: config
                    .blocked_hostnames
                    .iter()
                    .map(|host| normalize_name(host))
                    .collect(),
                credentials: CredentialSource::new(secret_store, &config.auth),
                mutator: RecordMutator::new(record_store, RetryPolicy::from(&config.retry)),
                update: config.update.clone(),
            }),
        })
    }

    /// Answer one update call
    ///
    /// Never fails: every path ends in a Dyndns2 reply.
    pub async fn handle(
        &self,
        query: &UpdateQuery,
        credentials: Option<ClientCredentials>,
        forwarded_for: Option<IpAddr>,
    ) -> Reply {
        // Credentials first: a rejected caller never sees `numhost`
        match self.authenticate(credentials.as_ref()).await {
            AuthDecision::Granted => {}
            AuthDecision::Denied => return render(&UpdateOutcome::BadAuth),
            AuthDecision::Unavailable => return render(&UpdateOutcome::DnsError),
        }

        let request =
            match UpdateRequest::parse(query, credentials, forwarded_for, &self.inner.update) {
                Ok(request) => request,
                Err(e) => {
                    info!("Rejected update request: {}", e);
                    return render(&UpdateOutcome::NumHost);
                }
            };

        let addresses = Addresses::new(request.ipv4, request.ipv6);
        let mut outcomes = Vec::with_capacity(request.hostnames.len());
        for hostname in &request.hostnames {
            let outcome = self
                .update_host(hostname, request.ipv4, request.ipv6, addresses)
                .await;
            let done = !outcome.is_success();
            outcomes.push(outcome);
            if done {
                break;
            }
        }

        render_batch(&outcomes)
    }

    /// Check presented credentials against the stored credential
    pub async fn authenticate(&self, credentials: Option<&ClientCredentials>) -> AuthDecision {
        match self.inner.credentials.authenticate(credentials).await {
            Ok(true) => AuthDecision::Granted,
            Ok(false) => {
                warn!(
                    "Authentication failed for user '{}'",
                    credentials.map(|c| c.username.as_str()).unwrap_or("<none>")
                );
                AuthDecision::Denied
            }
            Err(e) => {
                error!("Secret store unavailable: {}", e);
                AuthDecision::Unavailable
            }
        }
    }

    async fn update_host(
        &self,
        hostname: &str,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
        addresses: Addresses,
    ) -> UpdateOutcome {
        if self.inner.blocked.contains(hostname) {
            warn!(hostname = %hostname, "Refusing update for blocked hostname");
            return UpdateOutcome::Abuse;
        }

        let target = match self.inner.allowlist.authorize(hostname) {
            Ok(target) => target,
            Err(e) => {
                warn!("Authorization failed: {}", e);
                return UpdateOutcome::NotFound;
            }
        };

        let mutator = &self.inner.mutator;
        let zone = target.zone.as_str();
        let name = target.record_name.as_str();

        // Only requested families are read
        let current_a = match ipv4 {
            Some(_) => match mutator.fetch(zone, name, RecordType::A).await {
                Ok(record) => record,
                Err(_) => return UpdateOutcome::DnsError,
            },
            None => None,
        };
        let current_aaaa = match ipv6 {
            Some(_) => match mutator.fetch(zone, name, RecordType::Aaaa).await {
                Ok(record) => record,
                Err(_) => return UpdateOutcome::DnsError,
            },
            None => None,
        };

        let changes = detect(current_a.as_ref(), current_aaaa.as_ref(), ipv4, ipv6);
        if !changes.changed() {
            info!(hostname = %hostname, "No change needed ({})", addresses);
            return UpdateOutcome::NoChange(addresses);
        }

        let pending: Vec<(RecordType, BTreeSet<IpAddr>)> = changes
            .pending()
            .map(|(record_type, values)| (record_type, values.clone()))
            .collect();

        let task = tokio::spawn(apply(
            mutator.clone(),
            target.zone.clone(),
            target.record_name.clone(),
            pending,
            self.inner.update.ttl,
        ));

        match task.await {
            Ok(true) => {
                info!(hostname = %hostname, "Updated to {}", addresses);
                UpdateOutcome::Good(addresses)
            }
            Ok(false) => UpdateOutcome::DnsError,
            Err(e) => {
                error!(hostname = %hostname, "Update task failed: {}", e);
                UpdateOutcome::DnsError
            }
        }
    }
}

/// Write each pending record set, stopping at the first failure
async fn apply(
    mutator: RecordMutator,
    zone: String,
    name: String,
    pending: Vec<(RecordType, BTreeSet<IpAddr>)>,
    ttl: u32,
) -> bool {
    for (record_type, values) in &pending {
        if let Err(e) = mutator.upsert(&zone, &name, *record_type, values, ttl).await {
            debug!("Upsert aborted: {}", e);
            return false;
        }
    }
    true
}

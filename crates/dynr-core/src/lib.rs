// # dynr-core
//
// Core library for the dynr Dyndns2 update endpoint.
//
// ## Architecture Overview
//
// This library owns every decision made while answering a Dyndns2 update:
// - **auth**: Credential Verifier and the credential source backed by a `SecretStore`
// - **allowlist**: Zone/Record Authorizer over the deploy-time allow-list
// - **detector**: IP Change Detector (full-replace, per address family)
// - **mutator**: Record Mutator (timeouts, transient retry, failure classification)
// - **protocol**: Protocol Responder (outcome → Dyndns2 status line)
// - **handler**: Request Handler that sequences all of the above
//
// External collaborators are reached only through traits:
// - **RecordStore**: the authoritative DNS record store
// - **SecretStore**: read-only secret lookup
//
// ## Design Principles
//
// 1. **Stateless requests**: nothing mutable crosses requests except a write-once credential cache
// 2. **Plugin-based stores**: stores are created through the `StoreRegistry`
// 3. **Library-first**: the daemon is a thin HTTP shell around `UpdateHandler`
// 4. **Idempotency**: identical updates are answered with `nochg` and never rewrite the store

pub mod allowlist;
pub mod auth;
pub mod config;
pub mod detector;
pub mod error;
pub mod handler;
pub mod mutator;
pub mod protocol;
pub mod registry;
pub mod request;
pub mod secrets;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use allowlist::{Allowlist, Authorized, Unauthorized};
pub use auth::{ClientCredentials, Credential, CredentialSource};
pub use config::{DynrConfig, RecordStoreConfig, SecretStoreConfig, ZoneConfig};
pub use error::{Error, Result};
pub use handler::UpdateHandler;
pub use mutator::{DnsError, RecordMutator, RetryPolicy};
pub use protocol::{Addresses, Reply, UpdateOutcome};
pub use registry::StoreRegistry;
pub use request::{RequestError, UpdateQuery, UpdateRequest};
pub use store::{FileRecordStore, MemoryRecordStore};
pub use traits::{RecordStore, RecordType, SecretStore, ZoneRecord};

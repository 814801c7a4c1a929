//! Core traits for dynr
//!
//! This module defines the interfaces to the two external collaborators.
//!
//! - [`RecordStore`]: Read and upsert address records in the authoritative DNS store
//! - [`SecretStore`]: Read-only secret lookup

pub mod record_store;
pub mod secret_store;

pub use record_store::{RecordStore, RecordStoreFactory, RecordType, ZoneRecord, fqdn};
pub use secret_store::{SecretStore, SecretStoreFactory};

// # Record Store Implementations
//
// Built-in implementations of the RecordStore trait. Remote DNS providers
// live in their own crates.

pub mod file;
pub mod memory;

pub use file::{FileRecordStore, FileRecordStoreFactory};
pub use memory::{MemoryRecordStore, MemoryRecordStoreFactory};

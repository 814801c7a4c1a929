// # Secret Store Implementations
//
// Built-in implementations of the SecretStore trait.
//
// - `env`: one environment variable per secret
// - `file`: one file per secret under a directory (mounted secrets)
// - `StaticSecretStore`: fixed values for tests and embedding

pub mod env;
pub mod file;
pub mod memory;

pub use env::{EnvSecretStore, EnvSecretStoreFactory};
pub use file::{FileSecretStore, FileSecretStoreFactory};
pub use memory::StaticSecretStore;

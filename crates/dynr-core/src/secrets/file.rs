// # File Secret Store
//
// Reads secrets from files under a base directory, the layout produced by
// mounted secret volumes. The identifier is a relative path: `<id>.json` is
// tried first, then `<id>` as-is.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use crate::Error;
use crate::config::SecretStoreConfig;
use crate::traits::{SecretStore, SecretStoreFactory};

/// Secret store backed by files
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, id: &str) -> Result<[PathBuf; 2], Error> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if id.is_empty() || escapes {
            return Err(Error::secret_store(format!(
                "Secret identifier '{}' is not a relative path",
                id
            )));
        }

        Ok([self.dir.join(format!("{}.json", id)), self.dir.join(relative)])
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_secret(&self, id: &str) -> Result<Option<String>, Error> {
        for path in self.candidates(id)? {
            match fs::read_to_string(&path).await {
                Ok(content) => {
                    tracing::debug!("Read secret '{}' from {}", id, path.display());
                    return Ok(Some(content));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::secret_store(format!(
                        "Failed to read {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
        Ok(None)
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for `file` secret stores
pub struct FileSecretStoreFactory;

impl SecretStoreFactory for FileSecretStoreFactory {
    fn create(&self, config: &SecretStoreConfig) -> Result<Arc<dyn SecretStore>, Error> {
        match config {
            SecretStoreConfig::File { dir } => Ok(Arc::new(FileSecretStore::new(dir))),
            other => Err(Error::config(format!(
                "file factory cannot build a '{}' secret store",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_json_file_preferred() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("dynr/users")).unwrap();
        std::fs::write(
            dir.path().join("dynr/users/admin.json"),
            r#"{"username": "admin", "password": "pw"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("dynr/users/admin"), "plain").unwrap();

        let store = FileSecretStore::new(dir.path());
        let secret = store.get_secret("dynr/users/admin").await.unwrap().unwrap();
        assert!(secret.contains("\"password\""));
    }

    #[tokio::test]
    async fn test_plain_file_fallback() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("admin"), "pw\n").unwrap();

        let store = FileSecretStore::new(dir.path());
        assert_eq!(
            store.get_secret("admin").await.unwrap(),
            Some("pw\n".to_string())
        );
        assert_eq!(store.get_secret("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());

        assert!(store.get_secret("../etc/passwd").await.is_err());
        assert!(store.get_secret("/etc/passwd").await.is_err());
        assert!(store.get_secret("").await.is_err());
    }
}

//! JSON file storage for the command-line client.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{SessionStorage, StorageError};

/// A [`SessionStorage`] persisted as a flat JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written state file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if values.is_empty() {
            return match tokio::fs::remove_file(&self.path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        let json = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) + Send,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        f(&mut values);
        self.store(&values).await
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.update(|values| {
            values.insert(key.to_string(), value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|values| {
            values.remove(key);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::keys;

    #[tokio::test]
    async fn test_values_survive_a_new_instance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let storage = FileStorage::new(&path);
        storage.set(keys::TOKEN, "t1".into()).await.expect("set");
        storage
            .set(keys::CURRENT_ACCOUNT, "9".into())
            .await
            .expect("set");

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get(keys::TOKEN).await.expect("get").as_deref(),
            Some("t1")
        );
        assert_eq!(
            reopened
                .get(keys::CURRENT_ACCOUNT)
                .await
                .expect("get")
                .as_deref(),
            Some("9")
        );
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty_and_last_remove_deletes_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let storage = FileStorage::new(&path);

        assert!(storage.get(keys::TOKEN).await.expect("get").is_none());

        storage.set(keys::TOKEN, "t".into()).await.expect("set");
        assert!(path.exists());
        storage.remove(keys::TOKEN).await.expect("remove");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"not json").await.expect("write");

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get(keys::TOKEN).await,
            Err(StorageError::Encoding(_))
        ));
    }
}

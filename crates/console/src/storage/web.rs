//! Storage in the browser's cookie session.

use async_trait::async_trait;
use tower_sessions::Session;

use super::{SessionStorage, StorageError};

#[async_trait]
impl SessionStorage for Session {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(Self::get::<String>(self, key).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.insert(key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        Self::remove::<String>(self, key).await?;
        Ok(())
    }
}

//! Persisted session store.
//!
//! The console keeps exactly three values per browser session: the bearer
//! token, the logged-in user's profile (JSON) and the selected account id.
//! They survive process restarts of the *client* (browser reloads, CLI
//! invocations), not of the server.
//!
//! [`SessionStorage`] is the seam: the web console stores into the
//! `tower_sessions::Session` of the request, the CLI into a JSON file, and
//! tests into memory. [`Persisted`] layers the typed accessors on top.

mod file;
mod memory;
mod web;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use ad_console_core::{AccountId, UserProfile};
use async_trait::async_trait;
use thiserror::Error;

/// Storage keys.
pub mod keys {
    /// Bearer token.
    pub const TOKEN: &str = "token";
    /// JSON-encoded [`ad_console_core::UserProfile`].
    pub const USER_INFO: &str = "userInfo";
    /// Selected account id, as a decimal string.
    pub const CURRENT_ACCOUNT: &str = "currentAccount";

    /// Every key the session owns.
    pub const ALL: [&str; 3] = [TOKEN, USER_INFO, CURRENT_ACCOUNT];
}

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The request's cookie session failed.
    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Reading or writing the state file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file is not valid JSON.
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// String key/value store backing a console session.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Remove a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed view over a [`SessionStorage`].
#[derive(Clone, Copy)]
pub struct Persisted<'a> {
    storage: &'a dyn SessionStorage,
}

impl<'a> Persisted<'a> {
    #[must_use]
    pub fn new(storage: &'a dyn SessionStorage) -> Self {
        Self { storage }
    }

    /// The stored bearer token, if any. Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    pub async fn token(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .storage
            .get(keys::TOKEN)
            .await?
            .filter(|t| !t.trim().is_empty()))
    }

    /// Store the bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    pub async fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(keys::TOKEN, token.to_string()).await
    }

    /// The stored profile. A value that no longer decodes is treated as
    /// absent so a stale format cannot wedge the session.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    pub async fn user_info(&self) -> Result<Option<UserProfile>, StorageError> {
        let Some(raw) = self.storage.get(keys::USER_INFO).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable stored profile");
                Ok(None)
            }
        }
    }

    /// Store the profile as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if encoding or the backend fails.
    pub async fn set_user_info(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let json = serde_json::to_string(profile)?;
        self.storage.set(keys::USER_INFO, json).await
    }

    /// The stored account selection. Unparseable ids count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    pub async fn current_account(&self) -> Result<Option<AccountId>, StorageError> {
        Ok(self
            .storage
            .get(keys::CURRENT_ACCOUNT)
            .await?
            .and_then(|raw| raw.parse().ok()))
    }

    /// Store the account selection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    pub async fn set_current_account(&self, id: AccountId) -> Result<(), StorageError> {
        self.storage
            .set(keys::CURRENT_ACCOUNT, id.to_string())
            .await
    }

    /// Remove all three keys.
    ///
    /// # Errors
    ///
    /// Returns the first [`StorageError`]; remaining keys are still attempted.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in keys::ALL {
            if let Err(e) = self.storage.remove(key).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// The underlying store.
    #[must_use]
    pub fn raw(&self) -> &'a dyn SessionStorage {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_typed_accessors() {
        let storage = MemoryStorage::new();
        let persisted = Persisted::new(&storage);

        persisted.set_token("t1").await.expect("set token");
        persisted
            .set_current_account(AccountId::new(7))
            .await
            .expect("set account");

        assert_eq!(persisted.token().await.expect("token").as_deref(), Some("t1"));
        assert_eq!(
            storage.get(keys::CURRENT_ACCOUNT).await.expect("raw").as_deref(),
            Some("7")
        );
        assert_eq!(
            persisted.current_account().await.expect("account"),
            Some(AccountId::new(7))
        );
    }

    #[tokio::test]
    async fn test_garbage_values_read_as_absent() {
        let storage = MemoryStorage::new();
        storage.set(keys::USER_INFO, "{not json".into()).await.expect("set");
        storage.set(keys::CURRENT_ACCOUNT, "abc".into()).await.expect("set");
        storage.set(keys::TOKEN, "  ".into()).await.expect("set");

        let persisted = Persisted::new(&storage);
        assert!(persisted.user_info().await.expect("user").is_none());
        assert!(persisted.current_account().await.expect("account").is_none());
        assert!(persisted.token().await.expect("token").is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_all_keys() {
        let storage = MemoryStorage::new();
        for key in keys::ALL {
            storage.set(key, "x".into()).await.expect("set");
        }
        Persisted::new(&storage).clear().await.expect("clear");
        assert!(storage.is_empty());
    }
}

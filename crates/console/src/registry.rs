//! Per-browser-session console state.
//!
//! Each cookie session gets a [`ConsoleSession`]: its [`SessionManager`] and
//! the list state of the pages it has visited. They live in a `moka` cache
//! keyed by a random id kept in the cookie session, and are evicted after the
//! same idle period as the cookie.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use ad_console_core::{AccountRecord, AdCreative, AdGroup, AdPlan, ManagedUser};

use crate::listing::ListState;
use crate::session::SessionManager;
use crate::storage::{SessionStorage, StorageError};

/// Key in the cookie session under which the console id is stored.
const CONSOLE_ID_KEY: &str = "console_sid";

/// Upper bound on live console sessions.
const MAX_SESSIONS: u64 = 10_000;

/// List state of every CRUD page for one browser session.
#[derive(Debug)]
pub struct Workspace {
    pub ad_plans: ListState<AdPlan>,
    pub ad_groups: ListState<AdGroup>,
    pub ad_creatives: ListState<AdCreative>,
    pub users: ListState<ManagedUser>,
    pub accounts: ListState<AccountRecord>,
}

impl Workspace {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            ad_plans: ListState::new(page_size),
            ad_groups: ListState::new(page_size),
            ad_creatives: ListState::new(page_size),
            users: ListState::new(page_size),
            accounts: ListState::new(page_size),
        }
    }

    /// Drop every held list. In-flight fetches will be discarded.
    pub fn invalidate_all(&mut self) {
        self.ad_plans.invalidate();
        self.ad_groups.invalidate();
        self.ad_creatives.invalidate();
        self.users.invalidate();
        self.accounts.invalidate();
    }
}

/// Everything the console keeps for one browser session.
#[derive(Debug)]
pub struct ConsoleSession {
    id: Uuid,
    manager: SessionManager,
    workspace: Mutex<Workspace>,
}

impl ConsoleSession {
    fn new(id: Uuid, page_size: u32) -> Self {
        Self {
            id,
            manager: SessionManager::new(),
            workspace: Mutex::new(Workspace::new(page_size)),
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Lock the page lists. Never hold the guard across an `.await`.
    pub fn workspace(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the page lists locked.
    pub fn with_workspace<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        f(&mut self.workspace())
    }
}

/// Cache of live console sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<Uuid, Arc<ConsoleSession>>,
    page_size: u32,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.entry_count())
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new(idle_timeout: Duration, page_size: u32) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle_timeout)
            .build();
        Self {
            sessions,
            page_size,
        }
    }

    /// The console session bound to `storage`, creating one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the id cannot be read or written.
    pub async fn resolve(
        &self,
        storage: &dyn SessionStorage,
    ) -> Result<Arc<ConsoleSession>, StorageError> {
        let id = match storage
            .get(CONSOLE_ID_KEY)
            .await?
            .and_then(|raw| raw.parse::<Uuid>().ok())
        {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                storage.set(CONSOLE_ID_KEY, id.to_string()).await?;
                tracing::debug!(console_session = %id, "New console session");
                id
            }
        };

        let page_size = self.page_size;
        Ok(self
            .sessions
            .get_with(id, async move { Arc::new(ConsoleSession::new(id, page_size)) })
            .await)
    }

    /// Drop a console session, e.g. after logout.
    pub async fn forget(&self, id: Uuid) {
        self.sessions.invalidate(&id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Duration::from_secs(60), 20)
    }

    #[tokio::test]
    async fn test_same_storage_resolves_same_session() {
        let registry = registry();
        let storage = MemoryStorage::new();

        let first = registry.resolve(&storage).await.expect("resolve");
        let second = registry.resolve(&storage).await.expect("resolve");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            storage.value(CONSOLE_ID_KEY),
            Some(first.id().to_string())
        );
    }

    #[tokio::test]
    async fn test_distinct_storages_get_distinct_sessions() {
        let registry = registry();
        let a = registry.resolve(&MemoryStorage::new()).await.expect("a");
        let b = registry.resolve(&MemoryStorage::new()).await.expect("b");
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_forget_starts_fresh_state() {
        let registry = registry();
        let storage = MemoryStorage::new();

        let first = registry.resolve(&storage).await.expect("resolve");
        registry.forget(first.id()).await;
        let second = registry.resolve(&storage).await.expect("resolve");

        assert_eq!(first.id(), second.id());
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_garbage_id_is_replaced() {
        let registry = registry();
        let storage = MemoryStorage::with_values([(CONSOLE_ID_KEY, "not-a-uuid")]);
        let session = registry.resolve(&storage).await.expect("resolve");
        assert_eq!(
            storage.value(CONSOLE_ID_KEY),
            Some(session.id().to_string())
        );
    }
}

//! The session manager: one per browser session.
//!
//! Owns a [`SessionState`] and drives it through the backend. The state sits
//! behind a synchronous mutex that is never held across an `.await`; a
//! separate async gate makes `initialize` and `login` single-flight.

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use ad_console_core::{Account, AccountId, ProfilePatch, UserProfile};

use crate::api::{ApiError, Backend, Credentials};
use crate::storage::{Persisted, SessionStorage, StorageError};

use super::state::{LOGIN_FAILED_MESSAGE, SessionAction, SessionState};

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Another login or initialization is in flight for this session.
    #[error("another login is already in progress")]
    Busy,

    /// The operation needs a logged-in user.
    #[error("not logged in")]
    NotLoggedIn,

    /// The account is not among the user's accounts.
    #[error("account {0} is not available to this user")]
    AccountNotFound(AccountId),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Whether the backend no longer accepts the session's token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized))
    }
}

/// Outcome of a non-blocking initialization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// The session is resolved (logged in or out).
    Ready,
    /// Another request holds the gate; try again shortly.
    Pending,
}

/// Session/account state manager.
#[derive(Debug, Default)]
pub struct SessionManager {
    state: Mutex<SessionState>,
    gate: AsyncMutex<()>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, action: SessionAction) -> bool {
        let applied = self.lock().apply(action);
        if !applied {
            tracing::debug!("Session action ignored in current state");
        }
        applied
    }

    /// Restore the session from persisted credentials.
    ///
    /// Returns immediately once the session is resolved. Concurrent callers
    /// wait for the first one and then observe its result.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the persisted values cannot be
    /// read; the session is then logged out.
    pub async fn initialize(&self, backend: &Backend<'_>) -> Result<(), SessionError> {
        if self.lock().is_resolved() {
            return Ok(());
        }
        let _gate = self.gate.lock().await;
        self.initialize_locked(backend).await
    }

    /// Like [`Self::initialize`], but never waits: if another request is
    /// already initializing (or logging in), returns [`InitStatus::Pending`].
    ///
    /// # Errors
    ///
    /// See [`Self::initialize`].
    pub async fn initialize_or_pending(
        &self,
        backend: &Backend<'_>,
    ) -> Result<InitStatus, SessionError> {
        if self.lock().is_resolved() {
            return Ok(InitStatus::Ready);
        }
        let Ok(_gate) = self.gate.try_lock() else {
            return Ok(InitStatus::Pending);
        };
        self.initialize_locked(backend).await?;
        Ok(InitStatus::Ready)
    }

    async fn initialize_locked(&self, backend: &Backend<'_>) -> Result<(), SessionError> {
        if self.lock().is_resolved() {
            return Ok(());
        }

        let persisted = backend.persisted();
        let stored = match (persisted.token().await, persisted.user_info().await) {
            (Ok(token), Ok(user)) => token.zip(user),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to read persisted session");
                self.dispatch(SessionAction::Logout);
                return Err(e.into());
            }
        };

        let Some((token, user)) = stored else {
            // A token without a profile (or the reverse) cannot be restored.
            clear_quietly(persisted).await;
            self.dispatch(SessionAction::Logout);
            return Ok(());
        };

        match backend.validate_token(&token).await {
            Ok(validation) if validation.valid => {
                let user = match validation.user_info {
                    Some(fresh) if fresh != user => {
                        if let Err(e) = persisted.set_user_info(&fresh).await {
                            tracing::warn!(error = %e, "Failed to store refreshed profile");
                        }
                        fresh
                    }
                    _ => user,
                };
                tracing::info!(user_id = %user.id, "Session restored");
                self.dispatch(SessionAction::Restore(user));
                // Account failures are recorded in state and recoverable.
                let _ = self.load_accounts(backend).await;
            }
            Ok(_) => {
                tracing::info!("Stored token rejected, logging out");
                clear_quietly(persisted).await;
                self.dispatch(SessionAction::Logout);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token validation failed, logging out");
                clear_quietly(persisted).await;
                self.dispatch(SessionAction::Logout);
            }
        }
        Ok(())
    }

    /// Log in with username and password.
    ///
    /// On success the token and profile are persisted and accounts are
    /// loaded. On failure the session stays logged out with
    /// [`LOGIN_FAILED_MESSAGE`] as its error, and the error is returned.
    ///
    /// # Errors
    ///
    /// [`SessionError::Busy`] if a login or initialization is in flight;
    /// [`SessionError::Api`] or [`SessionError::Storage`] if the login fails.
    pub async fn login(
        &self,
        backend: &Backend<'_>,
        credentials: &Credentials,
    ) -> Result<UserProfile, SessionError> {
        let Ok(_gate) = self.gate.try_lock() else {
            return Err(SessionError::Busy);
        };
        self.dispatch(SessionAction::LoginStart);

        let response = match backend.login(credentials).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(username = %credentials.username, error = %e, "Login failed");
                self.dispatch(SessionAction::LoginFailure(LOGIN_FAILED_MESSAGE.to_string()));
                return Err(e.into());
            }
        };

        let persisted = backend.persisted();
        let stored = async {
            persisted.set_token(&response.token).await?;
            persisted.set_user_info(&response.user_info).await
        }
        .await;
        if let Err(e) = stored {
            tracing::error!(error = %e, "Failed to persist login");
            clear_quietly(persisted).await;
            self.dispatch(SessionAction::LoginFailure(LOGIN_FAILED_MESSAGE.to_string()));
            return Err(e.into());
        }

        let user = response.user_info;
        tracing::info!(user_id = %user.id, "Login succeeded");
        self.dispatch(SessionAction::LoginSuccess(user.clone()));
        let _ = self.load_accounts(backend).await;
        Ok(user)
    }

    /// Log out: tell the backend (best effort), then clear state and
    /// storage.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the persisted keys cannot be
    /// removed. The in-memory session is logged out regardless.
    pub async fn logout(&self, backend: &Backend<'_>) -> Result<(), SessionError> {
        if let Err(e) = backend.logout().await {
            tracing::warn!(error = %e, "Backend logout failed");
        }
        self.force_logout(backend.persisted().raw()).await
    }

    /// Clear state and storage without calling the backend. Used when a call
    /// reports the token as invalid.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the persisted keys cannot be
    /// removed.
    pub async fn force_logout(&self, storage: &dyn SessionStorage) -> Result<(), SessionError> {
        self.dispatch(SessionAction::Logout);
        Persisted::new(storage).clear().await?;
        tracing::info!("Session logged out");
        Ok(())
    }

    /// Fetch the user's accounts and select one.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotLoggedIn`] without a user; otherwise the backend or
    /// storage error, which is also recorded as the accounts error. An
    /// unauthorized response logs the session out.
    pub async fn load_accounts(&self, backend: &Backend<'_>) -> Result<(), SessionError> {
        if !self.dispatch(SessionAction::LoadAccountsStart) {
            return Err(SessionError::NotLoggedIn);
        }
        let persisted = backend.persisted();

        let accounts = match backend.my_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load accounts");
                if e.is_unauthorized() {
                    self.force_logout(persisted.raw()).await?;
                } else {
                    self.dispatch(SessionAction::LoadAccountsFailure(e.user_message()));
                }
                return Err(e.into());
            }
        };

        let preferred = persisted.current_account().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read stored account selection");
            None
        });
        let count = accounts.len();
        self.dispatch(SessionAction::LoadAccountsSuccess {
            accounts,
            preferred,
        });

        let selected = self.lock().current_account_id();
        tracing::debug!(count, selected = ?selected, "Accounts loaded");
        match selected {
            Some(id) if Some(id) != preferred => persisted.set_current_account(id).await?,
            _ => {}
        }
        Ok(())
    }

    /// Select another of the loaded accounts.
    ///
    /// # Errors
    ///
    /// [`SessionError::AccountNotFound`] if `id` is not loaded; the state is
    /// then unchanged.
    pub async fn switch_account(
        &self,
        storage: &dyn SessionStorage,
        id: AccountId,
    ) -> Result<Account, SessionError> {
        let account = {
            let mut state = self.lock();
            if !state.apply(SessionAction::SetCurrentAccount(id)) {
                return Err(SessionError::AccountNotFound(id));
            }
            state.current_account().cloned()
        };
        let account = account.ok_or(SessionError::AccountNotFound(id))?;
        Persisted::new(storage).set_current_account(id).await?;
        tracing::info!(account_id = %id, "Switched account");
        Ok(account)
    }

    /// Merge `patch` into the profile and persist it.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotLoggedIn`] without a user, or a storage error.
    pub async fn update_user_info(
        &self,
        storage: &dyn SessionStorage,
        patch: ProfilePatch,
    ) -> Result<UserProfile, SessionError> {
        let user = {
            let mut state = self.lock();
            if !state.apply(SessionAction::UpdateUserInfo(patch)) {
                return Err(SessionError::NotLoggedIn);
            }
            state.user().cloned()
        };
        let user = user.ok_or(SessionError::NotLoggedIn)?;
        Persisted::new(storage).set_user_info(&user).await?;
        Ok(user)
    }

    /// Clear the login error.
    pub fn clear_error(&self) {
        self.dispatch(SessionAction::ClearError);
    }
}

async fn clear_quietly(persisted: Persisted<'_>) {
    if let Err(e) = persisted.clear().await {
        tracing::warn!(error = %e, "Failed to clear persisted session");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ad_console_core::{AccountId, Role, UserId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::api::ApiClient;
    use crate::session::Phase;
    use crate::storage::{MemoryStorage, keys};

    // Nothing listens on the discard port; tests here never reach the network.
    fn offline_client() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9/api", Duration::from_millis(200)).expect("client")
    }

    fn profile() -> UserProfile {
        UserProfile {
            id: UserId::new(1),
            name: "A".into(),
            username: Some("a".into()),
            email: None,
            role: Role::User,
            avatar: None,
        }
    }

    fn account(id: i64) -> Account {
        Account {
            id: AccountId::new(id),
            name: format!("acct-{id}"),
            display_id: None,
            balance: Decimal::ZERO,
            daily_budget: Decimal::ZERO,
            today_cost: Decimal::ZERO,
            user_role: None,
        }
    }

    fn logged_in_with(accounts: Vec<Account>) -> SessionManager {
        let manager = SessionManager::new();
        manager.dispatch(SessionAction::LoginStart);
        manager.dispatch(SessionAction::LoginSuccess(profile()));
        manager.dispatch(SessionAction::LoadAccountsStart);
        manager.dispatch(SessionAction::LoadAccountsSuccess {
            accounts,
            preferred: None,
        });
        manager
    }

    #[tokio::test]
    async fn test_initialize_without_token_resolves_logged_out() {
        let client = offline_client();
        let storage = MemoryStorage::new();
        let manager = SessionManager::new();

        manager
            .initialize(&client.backend(&storage))
            .await
            .expect("initialize");
        assert_eq!(manager.snapshot().phase(), &Phase::LoggedOut);

        // Resolved sessions return without touching storage again.
        storage.set(keys::TOKEN, "late".into()).await.expect("set");
        manager
            .initialize(&client.backend(&storage))
            .await
            .expect("initialize");
        assert_eq!(manager.snapshot().phase(), &Phase::LoggedOut);
    }

    #[tokio::test]
    async fn test_initialize_with_token_but_no_profile_clears_leftovers() {
        let client = offline_client();
        let storage = MemoryStorage::with_values([(keys::TOKEN, "t1"), (keys::CURRENT_ACCOUNT, "7")]);
        let manager = SessionManager::new();

        manager
            .initialize(&client.backend(&storage))
            .await
            .expect("initialize");
        assert!(!manager.snapshot().is_logged_in());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_or_pending_reports_pending_while_gate_is_held() {
        let client = offline_client();
        let storage = MemoryStorage::new();
        let manager = SessionManager::new();

        let gate = manager.gate.lock().await;
        let status = manager
            .initialize_or_pending(&client.backend(&storage))
            .await
            .expect("initialize");
        assert_eq!(status, InitStatus::Pending);
        assert!(manager.snapshot().loading());
        drop(gate);

        let status = manager
            .initialize_or_pending(&client.backend(&storage))
            .await
            .expect("initialize");
        assert_eq!(status, InitStatus::Ready);
    }

    #[tokio::test]
    async fn test_login_while_gate_is_held_is_busy() {
        let client = offline_client();
        let storage = MemoryStorage::new();
        let manager = SessionManager::new();

        let _gate = manager.gate.lock().await;
        let result = manager
            .login(&client.backend(&storage), &Credentials::new("a", "b"))
            .await;
        assert!(matches!(result, Err(SessionError::Busy)));
        assert_eq!(manager.snapshot().phase(), &Phase::Unresolved);
    }

    #[tokio::test]
    async fn test_login_transport_failure_sets_error() {
        let client = offline_client();
        let storage = MemoryStorage::new();
        let manager = SessionManager::new();

        let result = manager
            .login(&client.backend(&storage), &Credentials::new("a", "b"))
            .await;
        assert!(matches!(result, Err(SessionError::Api(_))));

        let state = manager.snapshot();
        assert_eq!(state.phase(), &Phase::LoggedOut);
        assert_eq!(state.error(), Some(LOGIN_FAILED_MESSAGE));
        assert!(storage.is_empty());

        manager.clear_error();
        assert_eq!(manager.snapshot().error(), None);
    }

    #[tokio::test]
    async fn test_switch_to_unknown_account_changes_nothing() {
        let storage = MemoryStorage::new();
        let manager = logged_in_with(vec![account(7), account(9)]);
        let before = manager.snapshot();

        let result = manager.switch_account(&storage, AccountId::new(42)).await;
        assert!(matches!(result, Err(SessionError::AccountNotFound(id)) if id == AccountId::new(42)));
        assert_eq!(manager.snapshot(), before);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_switch_account_persists_selection() {
        let storage = MemoryStorage::new();
        let manager = logged_in_with(vec![account(7), account(9)]);

        let selected = manager
            .switch_account(&storage, AccountId::new(9))
            .await
            .expect("switch");
        assert_eq!(selected.id, AccountId::new(9));
        assert_eq!(
            manager.snapshot().current_account_id(),
            Some(AccountId::new(9))
        );
        assert_eq!(storage.value(keys::CURRENT_ACCOUNT).as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn test_update_user_info_merges_and_persists() {
        let storage = MemoryStorage::new();
        let manager = logged_in_with(Vec::new());

        let user = manager
            .update_user_info(
                &storage,
                ProfilePatch {
                    name: Some("Alice".into()),
                    ..ProfilePatch::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(user.name, "Alice");
        assert_eq!(user.id, UserId::new(1));

        let stored = Persisted::new(&storage)
            .user_info()
            .await
            .expect("read")
            .expect("profile");
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn test_update_user_info_requires_login() {
        let storage = MemoryStorage::new();
        let manager = SessionManager::new();
        let result = manager
            .update_user_info(&storage, ProfilePatch::default())
            .await;
        assert!(matches!(result, Err(SessionError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_force_logout_clears_everything() {
        let storage = MemoryStorage::with_values([
            (keys::TOKEN, "t1"),
            (keys::USER_INFO, "{}"),
            (keys::CURRENT_ACCOUNT, "7"),
        ]);
        let manager = logged_in_with(vec![account(7)]);

        manager.force_logout(&storage).await.expect("logout");
        let state = manager.snapshot();
        assert!(!state.is_logged_in());
        assert!(state.accounts().is_empty());
        assert!(storage.is_empty());
    }
}

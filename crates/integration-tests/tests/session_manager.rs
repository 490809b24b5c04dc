//! Session manager against the mock backend.
//!
//! Each test starts its own backend and keeps the session in a
//! [`MemoryStorage`], the way the CLI keeps it in a file and the console in
//! the cookie session.

use async_trait::async_trait;

use ad_console::api::{ApiError, Credentials};
use ad_console::session::{LOGIN_FAILED_MESSAGE, SessionError, SessionManager};
use ad_console::storage::{MemoryStorage, SessionStorage, StorageError, keys};
use ad_console_core::{AccountId, PageRequest, Role, UserId, UserProfile};
use ad_console_integration_tests::{MockBackend, fixture, profile};

/// Log `a` in against `backend`.
async fn logged_in(backend: &MockBackend, storage: &MemoryStorage) -> SessionManager {
    let api = backend.client();
    let manager = SessionManager::new();
    manager
        .login(&api.backend(storage), &Credentials::new("a", "b"))
        .await
        .expect("login");
    manager
}

/// Storage as a previous run of `a` left it, with a live token.
fn restored_storage(backend: &MockBackend, current_account: &str) -> MemoryStorage {
    let token = backend.data().issue_token(UserId::new(1));
    let user = serde_json::to_string(&profile(1, "a", "A", Role::User)).expect("profile json");
    MemoryStorage::with_values([
        (keys::TOKEN, token.as_str()),
        (keys::USER_INFO, user.as_str()),
        (keys::CURRENT_ACCOUNT, current_account),
    ])
}

#[tokio::test]
async fn test_login_persists_token_and_profile() {
    let backend = MockBackend::start(fixture()).await;
    let storage = MemoryStorage::new();
    let manager = logged_in(&backend, &storage).await;

    assert_eq!(storage.value(keys::TOKEN).as_deref(), Some("t1"));
    let stored: UserProfile =
        serde_json::from_str(&storage.value(keys::USER_INFO).expect("userInfo"))
            .expect("stored profile");
    assert_eq!(stored.id, UserId::new(1));
    assert_eq!(stored.name, "A");

    let state = manager.snapshot();
    assert!(state.is_logged_in());
    assert_eq!(state.user(), Some(&stored));
    assert_eq!(state.accounts().len(), 2);
    assert_eq!(state.current_account_id(), Some(AccountId::new(7)));
    assert_eq!(storage.value(keys::CURRENT_ACCOUNT).as_deref(), Some("7"));
}

#[tokio::test]
async fn test_failed_login_stays_logged_out() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = MemoryStorage::new();
    let manager = SessionManager::new();

    let err = manager
        .login(&api.backend(&storage), &Credentials::new("a", "wrong"))
        .await
        .expect_err("wrong password");
    assert!(matches!(err, SessionError::Api(ApiError::Rejected(_))));

    let state = manager.snapshot();
    assert!(!state.is_logged_in());
    assert_eq!(state.error(), Some(LOGIN_FAILED_MESSAGE));
    assert!(storage.is_empty());
    assert!(backend.data().tokens.is_empty());
}

#[tokio::test]
async fn test_restore_keeps_stored_account_when_still_available() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = restored_storage(&backend, "9");
    let manager = SessionManager::new();

    manager
        .initialize(&api.backend(&storage))
        .await
        .expect("initialize");

    let state = manager.snapshot();
    assert!(state.is_logged_in());
    assert_eq!(state.current_account_id(), Some(AccountId::new(9)));
    assert_eq!(storage.value(keys::CURRENT_ACCOUNT).as_deref(), Some("9"));
}

#[tokio::test]
async fn test_restore_replaces_unavailable_account_with_first() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = restored_storage(&backend, "99");
    let manager = SessionManager::new();

    manager
        .initialize(&api.backend(&storage))
        .await
        .expect("initialize");

    assert_eq!(
        manager.snapshot().current_account_id(),
        Some(AccountId::new(7))
    );
    assert_eq!(storage.value(keys::CURRENT_ACCOUNT).as_deref(), Some("7"));
}

#[tokio::test]
async fn test_initialize_validates_once() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = restored_storage(&backend, "7");
    let manager = SessionManager::new();

    for _ in 0..3 {
        manager
            .initialize(&api.backend(&storage))
            .await
            .expect("initialize");
    }
    assert_eq!(backend.calls("POST", "/auth/validate-token").len(), 1);
    assert_eq!(backend.calls("GET", "/users/accounts").len(), 1);
}

#[tokio::test]
async fn test_concurrent_initialize_validates_once() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = restored_storage(&backend, "7");
    let manager = SessionManager::new();
    let b = api.backend(&storage);

    let (first, second, third) = tokio::join!(
        manager.initialize(&b),
        manager.initialize(&b),
        manager.initialize(&b)
    );
    first.expect("first initialize");
    second.expect("second initialize");
    third.expect("third initialize");

    assert!(manager.snapshot().is_logged_in());
    assert_eq!(backend.calls("POST", "/auth/validate-token").len(), 1);
    assert_eq!(backend.calls("GET", "/users/accounts").len(), 1);
}

#[tokio::test]
async fn test_login_during_initialize_is_busy() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = restored_storage(&backend, "7");
    let manager = SessionManager::new();
    let b = api.backend(&storage);

    let creds = Credentials::new("a", "b");
    let (restored, login) = tokio::join!(manager.initialize(&b), manager.login(&b, &creds));
    restored.expect("initialize");
    assert!(matches!(login, Err(SessionError::Busy)));

    assert!(manager.snapshot().is_logged_in());
    assert!(backend.calls("POST", "/auth/login").is_empty());
    assert_eq!(backend.data().tokens.len(), 1);
}

/// Memory storage that refuses to store the profile.
#[derive(Debug)]
struct ProfileWriteFails(MemoryStorage);

#[async_trait]
impl SessionStorage for ProfileWriteFails {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        if key == keys::USER_INFO {
            return Err(std::io::Error::other("read-only profile").into());
        }
        self.0.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.0.remove(key).await
    }
}

#[tokio::test]
async fn test_restore_survives_failed_profile_write() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let token = backend.data().issue_token(UserId::new(1));
    let outdated =
        serde_json::to_string(&profile(1, "a", "Old name", Role::User)).expect("profile json");
    let storage = ProfileWriteFails(MemoryStorage::with_values([
        (keys::TOKEN, token.as_str()),
        (keys::USER_INFO, outdated.as_str()),
    ]));
    let manager = SessionManager::new();

    manager
        .initialize(&api.backend(&storage))
        .await
        .expect("initialize");

    let state = manager.snapshot();
    assert!(state.is_resolved());
    assert!(!state.loading());
    assert!(state.is_logged_in());
    assert_eq!(state.user().map(|u| u.name.as_str()), Some("A"));
    assert_eq!(state.current_account_id(), Some(AccountId::new(7)));
    assert_eq!(storage.0.value(keys::USER_INFO).as_deref(), Some(outdated.as_str()));
}

#[tokio::test]
async fn test_rejected_token_clears_storage() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let user = serde_json::to_string(&profile(1, "a", "A", Role::User)).expect("profile json");
    let storage = MemoryStorage::with_values([
        (keys::TOKEN, "stale"),
        (keys::USER_INFO, user.as_str()),
        (keys::CURRENT_ACCOUNT, "7"),
    ]);
    let manager = SessionManager::new();

    manager
        .initialize(&api.backend(&storage))
        .await
        .expect("initialize");

    let state = manager.snapshot();
    assert!(state.is_resolved());
    assert!(!state.is_logged_in());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_token_without_profile_is_discarded() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = MemoryStorage::with_values([(keys::TOKEN, "t9")]);
    let manager = SessionManager::new();

    manager
        .initialize(&api.backend(&storage))
        .await
        .expect("initialize");

    assert!(!manager.snapshot().is_logged_in());
    assert!(storage.is_empty());
    assert!(backend.calls("POST", "/auth/validate-token").is_empty());
}

#[tokio::test]
async fn test_rotated_token_replaces_stored_token() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = MemoryStorage::new();
    let _manager = logged_in(&backend, &storage).await;

    backend.data().rotate_token = Some("t-rotated".to_string());
    api.backend(&storage)
        .my_accounts()
        .await
        .expect("accounts");
    assert_eq!(storage.value(keys::TOKEN).as_deref(), Some("t-rotated"));

    // Only the rotated token is live now.
    let accounts = api
        .backend(&storage)
        .my_accounts()
        .await
        .expect("accounts with rotated token");
    assert_eq!(accounts.len(), 2);
}

#[tokio::test]
async fn test_envelope_rejection_surfaces_backend_message() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = MemoryStorage::new();
    let _manager = logged_in(&backend, &storage).await;

    backend.data().reject_next = Some("plan name already exists".to_string());
    let err = api
        .backend(&storage)
        .list_ad_plans(&PageRequest::new(1, 20, None), Some(AccountId::new(7)))
        .await
        .expect_err("rejected");
    assert!(matches!(err, ApiError::Rejected(_)));
    assert_eq!(err.user_message(), "plan name already exists");
}

#[tokio::test]
async fn test_list_requests_carry_account_scope() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = MemoryStorage::new();
    let _manager = logged_in(&backend, &storage).await;

    let page = api
        .backend(&storage)
        .list_ad_plans(&PageRequest::new(1, 20, Some("sale")), Some(AccountId::new(7)))
        .await
        .expect("plans");
    assert_eq!(page.total, 1);
    assert_eq!(page.items.first().map(|p| p.name.as_str()), Some("Spring sale"));

    let calls = backend.calls("GET", "/ad-plans");
    let call = calls.last().expect("recorded list call");
    assert_eq!(call.param("accountId").as_deref(), Some("7"));
    assert_eq!(call.param("name").as_deref(), Some("sale"));
    assert_eq!(call.param("pageSize").as_deref(), Some("20"));
}

#[tokio::test]
async fn test_logout_clears_session_and_revokes_token() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = MemoryStorage::new();
    let manager = logged_in(&backend, &storage).await;

    manager
        .logout(&api.backend(&storage))
        .await
        .expect("logout");

    let state = manager.snapshot();
    assert!(!state.is_logged_in());
    assert!(state.accounts().is_empty());
    assert!(storage.is_empty());
    assert!(backend.data().tokens.is_empty());
}

#[tokio::test]
async fn test_revoked_token_during_account_load_logs_out() {
    let backend = MockBackend::start(fixture()).await;
    let api = backend.client();
    let storage = MemoryStorage::new();
    let manager = logged_in(&backend, &storage).await;

    backend.data().tokens.clear();
    let err = manager
        .load_accounts(&api.backend(&storage))
        .await
        .expect_err("unauthorized");

    assert!(err.is_unauthorized());
    assert!(!manager.snapshot().is_logged_in());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_switch_account() {
    let backend = MockBackend::start(fixture()).await;
    let storage = MemoryStorage::new();
    let manager = logged_in(&backend, &storage).await;

    let err = manager
        .switch_account(&storage, AccountId::new(99))
        .await
        .expect_err("unknown account");
    assert!(matches!(err, SessionError::AccountNotFound(id) if id == AccountId::new(99)));
    assert_eq!(
        manager.snapshot().current_account_id(),
        Some(AccountId::new(7))
    );

    let account = manager
        .switch_account(&storage, AccountId::new(9))
        .await
        .expect("switch");
    assert_eq!(account.name, "South");
    assert_eq!(storage.value(keys::CURRENT_ACCOUNT).as_deref(), Some("9"));
}

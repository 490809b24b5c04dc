//! Session state and its reducer.
//!
//! [`SessionState`] is plain data: every change goes through
//! [`SessionState::apply`], which refuses transitions that would break the
//! invariants below instead of panicking.
//!
//! - A logged-in session always carries a profile.
//! - The current account, when set, is an element of the loaded account list.
//! - Account data exists only while logged in.

use serde::{Deserialize, Serialize};

use ad_console_core::{Account, AccountId, CapabilitySet, ProfilePatch, UserProfile};

/// Message shown when a login attempt fails for any reason.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed, check username and password";

/// Authentication phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// Persisted credentials have not been checked yet.
    #[default]
    Unresolved,
    LoggedOut,
    /// A login request is in flight.
    LoggingIn,
    LoggedIn { user: UserProfile },
}

/// A state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    LoginStart,
    LoginSuccess(UserProfile),
    LoginFailure(String),
    /// A persisted session was validated on startup.
    Restore(UserProfile),
    Logout,
    UpdateUserInfo(ProfilePatch),
    ClearError,
    LoadAccountsStart,
    /// Accounts arrived; `preferred` is the previously persisted selection.
    LoadAccountsSuccess {
        accounts: Vec<Account>,
        preferred: Option<AccountId>,
    },
    LoadAccountsFailure(String),
    SetCurrentAccount(AccountId),
}

/// Everything the console knows about who is logged in and in which account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionState {
    #[serde(flatten)]
    phase: Phase,
    error: Option<String>,
    accounts: Vec<Account>,
    current_account: Option<AccountId>,
    accounts_loading: bool,
    accounts_error: Option<String>,
}

impl SessionState {
    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Whether persisted credentials have been checked.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self.phase, Phase::Unresolved)
    }

    /// True while the session is being restored or a login is in flight.
    #[must_use]
    pub const fn loading(&self) -> bool {
        matches!(self.phase, Phase::Unresolved | Phase::LoggingIn)
    }

    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        matches!(self.phase, Phase::LoggedIn { .. })
    }

    #[must_use]
    pub const fn user(&self) -> Option<&UserProfile> {
        match &self.phase {
            Phase::LoggedIn { user } => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    #[must_use]
    pub fn current_account(&self) -> Option<&Account> {
        let id = self.current_account?;
        self.accounts.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub const fn current_account_id(&self) -> Option<AccountId> {
        self.current_account
    }

    #[must_use]
    pub const fn accounts_loading(&self) -> bool {
        self.accounts_loading
    }

    #[must_use]
    pub fn accounts_error(&self) -> Option<&str> {
        self.accounts_error.as_deref()
    }

    /// Capabilities of the logged-in user in the current account.
    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.user().map_or_else(CapabilitySet::empty, |user| {
            CapabilitySet::for_user(user, self.current_account())
        })
    }

    /// Apply a transition. Returns `false` if the action does not apply in
    /// the current state; the state is then unchanged.
    pub fn apply(&mut self, action: SessionAction) -> bool {
        match action {
            SessionAction::LoginStart => {
                if matches!(self.phase, Phase::LoggingIn) {
                    return false;
                }
                *self = Self {
                    phase: Phase::LoggingIn,
                    ..Self::default()
                };
            }
            SessionAction::LoginSuccess(user) => {
                if !matches!(self.phase, Phase::LoggingIn) {
                    return false;
                }
                *self = Self {
                    phase: Phase::LoggedIn { user },
                    ..Self::default()
                };
            }
            SessionAction::LoginFailure(message) => {
                if !matches!(self.phase, Phase::LoggingIn) {
                    return false;
                }
                *self = Self {
                    phase: Phase::LoggedOut,
                    error: Some(message),
                    ..Self::default()
                };
            }
            SessionAction::Restore(user) => {
                if !matches!(self.phase, Phase::Unresolved) {
                    return false;
                }
                *self = Self {
                    phase: Phase::LoggedIn { user },
                    ..Self::default()
                };
            }
            SessionAction::Logout => {
                *self = Self {
                    phase: Phase::LoggedOut,
                    ..Self::default()
                };
            }
            SessionAction::UpdateUserInfo(patch) => match &mut self.phase {
                Phase::LoggedIn { user } => user.merge(patch),
                _ => return false,
            },
            SessionAction::ClearError => self.error = None,
            SessionAction::LoadAccountsStart => {
                if !self.is_logged_in() {
                    return false;
                }
                self.accounts_loading = true;
                self.accounts_error = None;
            }
            SessionAction::LoadAccountsSuccess {
                accounts,
                preferred,
            } => {
                if !self.is_logged_in() {
                    return false;
                }
                self.current_account = select_account(&accounts, preferred);
                self.accounts = accounts;
                self.accounts_loading = false;
                self.accounts_error = None;
            }
            SessionAction::LoadAccountsFailure(message) => {
                if !self.is_logged_in() {
                    return false;
                }
                self.accounts.clear();
                self.current_account = None;
                self.accounts_loading = false;
                self.accounts_error = Some(message);
            }
            SessionAction::SetCurrentAccount(id) => {
                if !self.accounts.iter().any(|a| a.id == id) {
                    return false;
                }
                self.current_account = Some(id);
            }
        }
        true
    }
}

/// Pick the account to select after loading: the persisted choice if it is
/// still in the list, otherwise the first account, otherwise none.
#[must_use]
pub fn select_account(accounts: &[Account], preferred: Option<AccountId>) -> Option<AccountId> {
    preferred
        .filter(|id| accounts.iter().any(|a| a.id == *id))
        .or_else(|| accounts.first().map(|a| a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_console_core::{AccountRole, Role, UserId};
    use rust_decimal::Decimal;

    fn user(name: &str) -> UserProfile {
        UserProfile {
            id: UserId::new(1),
            name: name.to_string(),
            username: None,
            email: None,
            role: Role::User,
            avatar: None,
        }
    }

    fn account(id: i64) -> Account {
        Account {
            id: AccountId::new(id),
            name: format!("Account {id}"),
            display_id: None,
            balance: Decimal::ZERO,
            daily_budget: Decimal::ZERO,
            today_cost: Decimal::ZERO,
            user_role: Some(AccountRole::AdOperator),
        }
    }

    fn logged_in() -> SessionState {
        let mut state = SessionState::default();
        assert!(state.apply(SessionAction::LoginStart));
        assert!(state.apply(SessionAction::LoginSuccess(user("A"))));
        state
    }

    #[test]
    fn test_initial_state_is_loading() {
        let state = SessionState::default();
        assert!(state.loading());
        assert!(!state.is_resolved());
        assert!(!state.is_logged_in());
    }

    #[test]
    fn test_login_flow() {
        let mut state = SessionState::default();
        state.apply(SessionAction::LoginStart);
        assert!(state.loading());
        assert_eq!(state.phase(), &Phase::LoggingIn);

        state.apply(SessionAction::LoginSuccess(user("A")));
        assert!(state.is_logged_in());
        assert!(!state.loading());
        assert_eq!(state.user().map(|u| u.name.as_str()), Some("A"));
    }

    #[test]
    fn test_login_failure_sets_error_and_stays_logged_out() {
        let mut state = SessionState::default();
        state.apply(SessionAction::LoginStart);
        state.apply(SessionAction::LoginFailure(LOGIN_FAILED_MESSAGE.into()));
        assert_eq!(state.phase(), &Phase::LoggedOut);
        assert_eq!(state.error(), Some(LOGIN_FAILED_MESSAGE));

        state.apply(SessionAction::ClearError);
        assert!(state.error().is_none());
    }

    #[test]
    fn test_login_success_requires_login_in_flight() {
        let mut state = SessionState::default();
        assert!(!state.apply(SessionAction::LoginSuccess(user("A"))));
        assert!(!state.is_logged_in());
    }

    #[test]
    fn test_select_account_policy() {
        let accounts = vec![account(7), account(9)];
        assert_eq!(
            select_account(&accounts, Some(AccountId::new(7))),
            Some(AccountId::new(7))
        );
        assert_eq!(
            select_account(&accounts, Some(AccountId::new(9))),
            Some(AccountId::new(9))
        );
        assert_eq!(
            select_account(&accounts, Some(AccountId::new(99))),
            Some(AccountId::new(7))
        );
        assert_eq!(select_account(&accounts, None), Some(AccountId::new(7)));
        assert_eq!(select_account(&[], Some(AccountId::new(7))), None);
    }

    #[test]
    fn test_accounts_loaded_selects_member() {
        let mut state = logged_in();
        state.apply(SessionAction::LoadAccountsStart);
        assert!(state.accounts_loading());
        state.apply(SessionAction::LoadAccountsSuccess {
            accounts: vec![account(7), account(9)],
            preferred: Some(AccountId::new(99)),
        });
        assert!(!state.accounts_loading());
        let current = state.current_account().expect("selected");
        assert!(state.accounts().contains(current));
        assert_eq!(current.id, AccountId::new(7));
    }

    #[test]
    fn test_empty_account_list_is_not_an_error() {
        let mut state = logged_in();
        state.apply(SessionAction::LoadAccountsSuccess {
            accounts: vec![],
            preferred: None,
        });
        assert!(state.current_account().is_none());
        assert!(state.accounts_error().is_none());
    }

    #[test]
    fn test_unknown_account_switch_is_refused() {
        let mut state = logged_in();
        state.apply(SessionAction::LoadAccountsSuccess {
            accounts: vec![account(7), account(9)],
            preferred: None,
        });
        let before = state.clone();
        assert!(!state.apply(SessionAction::SetCurrentAccount(AccountId::new(3))));
        assert_eq!(state, before);

        assert!(state.apply(SessionAction::SetCurrentAccount(AccountId::new(9))));
        assert_eq!(state.current_account_id(), Some(AccountId::new(9)));
    }

    #[test]
    fn test_account_failure_leaves_selection_unset() {
        let mut state = logged_in();
        state.apply(SessionAction::LoadAccountsStart);
        state.apply(SessionAction::LoadAccountsFailure("boom".into()));
        assert!(state.current_account().is_none());
        assert_eq!(state.accounts_error(), Some("boom"));
        assert!(state.is_logged_in());
    }

    #[test]
    fn test_accounts_ignored_after_logout() {
        let mut state = logged_in();
        state.apply(SessionAction::Logout);
        assert!(!state.apply(SessionAction::LoadAccountsSuccess {
            accounts: vec![account(7)],
            preferred: None,
        }));
        assert!(state.accounts().is_empty());
        assert!(!state.is_logged_in());
    }

    #[test]
    fn test_update_user_info_merges() {
        let mut state = logged_in();
        state.apply(SessionAction::UpdateUserInfo(ProfilePatch {
            avatar: Some("/a.png".into()),
            ..ProfilePatch::default()
        }));
        let user = state.user().expect("user");
        assert_eq!(user.name, "A");
        assert_eq!(user.avatar.as_deref(), Some("/a.png"));
    }

    #[test]
    fn test_state_serializes() {
        let state = logged_in();
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["phase"], "logged_in");
        let back: SessionState = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, state);
    }
}

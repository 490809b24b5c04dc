//! User administration. Super admins only.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use ad_console_core::{
    AccountBinding, AccountId, AccountRole, Capability, Email, InputError, ManagedUser, NewUser,
    Page, ProfilePatch, Role, UserAccount, UserId, UserPatch,
    user::{MAX_USERNAME_LENGTH, validate_password},
    validation::required_text,
};

use crate::api::ApiError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::{
    Chrome, ListParams, OpenForm, Pager, SelectOption, inline_error, refresh_list, render,
    set_flash,
};
use crate::state::AppState;

use super::form;

const PATH: &str = "/admin/users";

#[derive(Template)]
#[template(path = "admin/users.html")]
struct UsersTemplate {
    chrome: Chrome,
    users: Vec<ManagedUser>,
    pager: Pager,
    list_path: &'static str,
    current_user: Option<UserId>,
    editor: Option<UserEditor>,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/user_accounts.html")]
struct UserAccountsTemplate {
    chrome: Chrome,
    user: ManagedUser,
    bindings: Vec<BindingView>,
    available: Vec<SelectOption>,
    roles: Vec<SelectOption>,
}

/// A bound account with its role picker.
struct BindingView {
    account_id: AccountId,
    label: String,
    role_label: &'static str,
    roles: Vec<SelectOption>,
}

impl From<&UserAccount> for BindingView {
    fn from(binding: &UserAccount) -> Self {
        let label = match binding.display_id.as_deref() {
            Some(display_id) if !display_id.is_empty() => {
                format!("{} ({display_id})", binding.name)
            }
            _ => binding.name.clone(),
        };
        Self {
            account_id: binding.id,
            label,
            role_label: binding.account_role.label(),
            roles: account_role_options(binding.account_role.as_str()),
        }
    }
}

fn account_role_options(current: &str) -> Vec<SelectOption> {
    AccountRole::ALL
        .iter()
        .map(|r| SelectOption::new(r.as_str(), r.label(), current))
        .collect()
}

fn role_options(current: &str) -> Vec<SelectOption> {
    Role::ALL
        .iter()
        .map(|r| SelectOption::new(r.as_str(), r.label(), current))
        .collect()
}

/// Create, edit or password form as rendered.
struct UserEditor {
    title: String,
    action: String,
    values: UserForm,
    roles: Vec<SelectOption>,
    creating: bool,
    password_only: bool,
}

enum Editor {
    Create(UserForm),
    Edit(UserId, UserForm),
    Password(UserId, String),
}

impl Editor {
    fn view(self) -> UserEditor {
        match self {
            Self::Create(values) => UserEditor {
                title: "New user".to_string(),
                action: PATH.to_string(),
                roles: role_options(&values.role),
                values,
                creating: true,
                password_only: false,
            },
            Self::Edit(id, values) => UserEditor {
                title: format!("Edit {}", values.username),
                action: format!("{PATH}/{id}"),
                roles: role_options(&values.role),
                values,
                creating: false,
                password_only: false,
            },
            Self::Password(id, username) => UserEditor {
                title: format!("Reset password for {username}"),
                action: format!("{PATH}/{id}/password"),
                roles: Vec::new(),
                values: UserForm::default(),
                creating: false,
                password_only: true,
            },
        }
    }
}

/// The user form as posted. `password` is only read on create.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserForm {
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub password: String,
}

impl Default for UserForm {
    fn default() -> Self {
        Self {
            username: String::new(),
            name: String::new(),
            email: String::new(),
            role: Role::default().as_str().to_string(),
            password: String::new(),
        }
    }
}

impl From<&ManagedUser> for UserForm {
    fn from(user: &ManagedUser) -> Self {
        Self {
            username: user.username.clone(),
            name: user.name.clone().unwrap_or_default(),
            email: user.email.clone().unwrap_or_default(),
            role: user.role.as_str().to_string(),
            password: String::new(),
        }
    }
}

impl UserForm {
    fn role(&self) -> Result<Role, InputError> {
        self.role.parse().map_err(InputError::Invalid)
    }

    fn to_new_user(&self) -> Result<NewUser, InputError> {
        let mut user = NewUser {
            username: self.username.trim().to_string(),
            name: form::optional_text(&self.name),
            email: form::optional_text(&self.email),
            role: self.role()?,
            password: self.password.clone(),
        };
        user.validate()?;
        Ok(user)
    }

    fn to_patch(&self) -> Result<UserPatch, InputError> {
        required_text("username", &self.username, MAX_USERNAME_LENGTH)?;
        let email = form::optional_text(&self.email)
            .map(|raw| Email::parse(&raw).map(String::from))
            .transpose()
            .map_err(|e| InputError::Invalid(e.to_string()))?;
        Ok(UserPatch {
            username: Some(self.username.trim().to_string()),
            name: form::optional_text(&self.name),
            email,
            role: Some(self.role()?),
            ..UserPatch::default()
        })
    }
}

#[derive(Deserialize)]
pub struct PasswordForm {
    pub password: String,
    pub confirm_password: String,
}

impl PasswordForm {
    fn to_patch(&self) -> Result<UserPatch, InputError> {
        validate_password(&self.password)?;
        if self.password != self.confirm_password {
            return Err(InputError::Invalid("passwords do not match".to_string()));
        }
        Ok(UserPatch::password_reset(self.password.clone()))
    }
}

#[derive(Debug, Deserialize)]
pub struct BindingForm {
    pub account_id: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

fn parse_account_role(raw: &str) -> Result<AccountRole, AppError> {
    raw.parse().map_err(AppError::BadRequest)
}

/// GET /admin/users
#[instrument(skip_all)]
pub async fn index(
    guard: RequireSession,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;
    guard.console.with_workspace(|w| params.apply(&mut w.users));
    refresh(&guard).await?;

    let find = |id: i64| {
        guard
            .console
            .with_workspace(|w| w.users.get(UserId::new(id)).cloned())
    };
    let editor = match params.open_form() {
        Some(OpenForm::New) => Some(Editor::Create(UserForm::default())),
        Some(OpenForm::Edit(id)) => {
            find(id).map(|user| Editor::Edit(user.id, UserForm::from(&user)))
        }
        Some(OpenForm::Password(id)) => {
            find(id).map(|user| Editor::Password(user.id, user.username))
        }
        _ => None,
    };
    render_page(&guard, &state, editor, None).await
}

/// POST /admin/users
#[instrument(skip_all)]
pub async fn create(
    guard: RequireSession,
    State(state): State<AppState>,
    Form(values): Form<UserForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;

    let result = match values.to_new_user() {
        Ok(user) => {
            let result = guard.backend().create_user(&user).await;
            guard.checked(result).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "User created");
            guard.console.with_workspace(|w| w.users.prepend(user));
            set_flash(&guard.session, "User created").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            let values = UserForm {
                password: String::new(),
                ..values
            };
            render_page(&guard, &state, Some(Editor::Create(values)), Some(message)).await
        }
    }
}

/// Edit username, name, e-mail and role.
///
/// POST /admin/users/{id}
#[instrument(skip_all, fields(user_id = %id))]
pub async fn update(
    guard: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Form(values): Form<UserForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;

    let result = match values.to_patch() {
        Ok(patch) => {
            let result = guard.backend().update_user(id, &patch).await;
            guard.checked(result).await.map(|()| patch)
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(patch) => {
            tracing::info!("User updated");
            apply_patch(&guard, id, &patch).await;
            set_flash(&guard.session, "User updated").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Edit(id, values)), Some(message)).await
        }
    }
}

/// POST /admin/users/{id}/ban
#[instrument(skip_all, fields(user_id = %id))]
pub async fn toggle_ban(
    guard: RequireSession,
    Path(id): Path<UserId>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;
    if is_self(&guard, id) {
        set_flash(&guard.session, "You cannot ban your own user").await;
        return Ok(Redirect::to(PATH).into_response());
    }

    refresh(&guard).await?;
    let banned = guard
        .console
        .with_workspace(|w| w.users.get(id).map(|u| u.ban))
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    let patch = UserPatch {
        ban: Some(!banned),
        ..UserPatch::default()
    };
    let result = guard.backend().update_user(id, &patch).await;
    match guard.checked(result).await {
        Ok(()) => {
            tracing::info!(ban = !banned, "User ban changed");
            apply_patch(&guard, id, &patch).await;
            let notice = if banned { "User unbanned" } else { "User banned" };
            set_flash(&guard.session, notice).await;
        }
        Err(e) => set_flash(&guard.session, inline_error(e)?).await,
    }
    Ok(Redirect::to(PATH).into_response())
}

/// POST /admin/users/{id}/password
#[instrument(skip_all, fields(user_id = %id))]
pub async fn reset_password(
    guard: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Form(values): Form<PasswordForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;

    let result = match values.to_patch() {
        Ok(patch) => {
            let result = guard.backend().update_user(id, &patch).await;
            guard.checked(result).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => {
            tracing::info!("User password reset");
            set_flash(&guard.session, "Password reset").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            let username = guard
                .console
                .with_workspace(|w| w.users.get(id).map(|u| u.username.clone()))
                .unwrap_or_else(|| id.to_string());
            render_page(&guard, &state, Some(Editor::Password(id, username)), Some(message)).await
        }
    }
}

/// POST /admin/users/{id}/delete
#[instrument(skip_all, fields(user_id = %id))]
pub async fn delete(guard: RequireSession, Path(id): Path<UserId>) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;
    if is_self(&guard, id) {
        set_flash(&guard.session, "You cannot delete your own user").await;
        return Ok(Redirect::to(PATH).into_response());
    }

    let result = guard.backend().delete_user(id).await;
    match guard.checked(result).await {
        Ok(()) => {
            tracing::info!("User deleted");
            guard.console.with_workspace(|w| w.users.remove(id));
            set_flash(&guard.session, "User deleted").await;
        }
        Err(e) => set_flash(&guard.session, inline_error(e)?).await,
    }
    Ok(Redirect::to(PATH).into_response())
}

/// The user's account bindings.
///
/// GET /admin/users/{id}/accounts
#[instrument(skip_all, fields(user_id = %id))]
pub async fn accounts(
    guard: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;
    let backend = guard.backend();

    let user = guard.checked(backend.get_user(id).await).await?;
    let bindings = guard.checked(backend.user_accounts(id).await).await?;
    let all_accounts = guard.checked(backend.all_accounts().await).await?;

    let available = all_accounts
        .iter()
        .filter(|a| bindings.iter().all(|b| b.id != a.id))
        .map(|a| SelectOption::new(a.id.to_string(), a.name.clone(), ""))
        .collect();

    let path = format!("{PATH}/{id}/accounts");
    Ok(render(&UserAccountsTemplate {
        chrome: Chrome::new(&guard, &state, &path).await,
        user,
        bindings: bindings.iter().map(BindingView::from).collect(),
        available,
        roles: account_role_options(AccountRole::AdOperator.as_str()),
    }))
}

/// POST /admin/users/{id}/accounts
#[instrument(skip_all, fields(user_id = %id))]
pub async fn bind_account(
    guard: RequireSession,
    Path(id): Path<UserId>,
    Form(values): Form<BindingForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;
    let binding = AccountBinding {
        account_id: values
            .account_id
            .parse()
            .map_err(|_| AppError::BadRequest("Select an account".to_string()))?,
        role: parse_account_role(&values.role)?,
    };

    let result = guard.backend().bind_user_account(id, binding).await;
    finish_binding_change(&guard, id, result, "Account bound").await
}

/// POST /admin/users/{id}/accounts/{account_id}
#[instrument(skip_all, fields(user_id = %id, account_id = %account_id))]
pub async fn change_account_role(
    guard: RequireSession,
    Path((id, account_id)): Path<(UserId, AccountId)>,
    Form(values): Form<RoleForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;
    let binding = AccountBinding {
        account_id,
        role: parse_account_role(&values.role)?,
    };

    let result = guard.backend().update_user_account_role(id, binding).await;
    finish_binding_change(&guard, id, result, "Account role updated").await
}

/// POST /admin/users/{id}/accounts/{account_id}/unbind
#[instrument(skip_all, fields(user_id = %id, account_id = %account_id))]
pub async fn unbind_account(
    guard: RequireSession,
    Path((id, account_id)): Path<(UserId, AccountId)>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageUsers)?;
    let result = guard.backend().unbind_user_account(id, account_id).await;
    finish_binding_change(&guard, id, result, "Account unbound").await
}

async fn finish_binding_change(
    guard: &RequireSession,
    id: UserId,
    result: Result<(), ApiError>,
    notice: &str,
) -> Result<Response, AppError> {
    match guard.checked(result).await {
        Ok(()) => {
            tracing::info!(user_id = %id, notice, "Account binding changed");
            // The user's own account list and role may have changed.
            if is_self(guard, id) {
                if let Err(e) = guard.console.manager().load_accounts(&guard.backend()).await {
                    tracing::warn!(error = %e, "Failed to reload own accounts");
                }
                guard.console.with_workspace(|w| w.invalidate_all());
            }
            set_flash(&guard.session, notice).await;
        }
        Err(e) => set_flash(&guard.session, inline_error(e)?).await,
    }
    Ok(Redirect::to(&format!("{PATH}/{id}/accounts")).into_response())
}

fn is_self(guard: &RequireSession, id: UserId) -> bool {
    guard.state.user().is_some_and(|u| u.id == id)
}

/// Reconcile the held list and, when editing oneself, the session profile.
async fn apply_patch(guard: &RequireSession, id: UserId, patch: &UserPatch) {
    let merged = guard
        .console
        .with_workspace(|w| w.users.merge(id, |user| user.apply_patch(patch)));
    if merged.is_err() {
        guard.console.with_workspace(|w| w.users.mark_stale());
    }

    if is_self(guard, id) {
        let profile = ProfilePatch {
            name: patch.name.clone(),
            email: patch.email.clone(),
            avatar: None,
            role: patch.role,
        };
        if let Err(e) = guard
            .console
            .manager()
            .update_user_info(&guard.session, profile)
            .await
        {
            tracing::warn!(error = %e, "Failed to update own profile");
        }
    }
}

async fn refresh(guard: &RequireSession) -> Result<(), AppError> {
    let backend = guard.backend();
    refresh_list(guard, |w| &mut w.users, |query, _account| async move {
        backend
            .list_users()
            .await
            .map(|users| Page::from_all(users, &query, |u| u.username.as_str()))
    })
    .await
}

async fn render_page(
    guard: &RequireSession,
    state: &AppState,
    editor: Option<Editor>,
    error: Option<String>,
) -> Result<Response, AppError> {
    refresh(guard).await?;
    let (users, pager) = guard
        .console
        .with_workspace(|w| (w.users.items().to_vec(), Pager::of(&w.users)));

    Ok(render(&UsersTemplate {
        chrome: Chrome::new(guard, state, PATH).await,
        users,
        pager,
        list_path: PATH,
        current_user: guard.state.user().map(|u| u.id),
        editor: editor.map(Editor::view),
        error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> UserForm {
        UserForm {
            username: " ops ".into(),
            name: "Ops".into(),
            email: "ops@example.com".into(),
            role: "admin".into(),
            password: "secret1".into(),
        }
    }

    #[test]
    fn test_new_user_from_form() {
        let user = filled().to_new_user().expect("user");
        assert_eq!(user.username, "ops");
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.name.as_deref(), Some("Ops"));

        let short = UserForm {
            password: "123".into(),
            ..filled()
        };
        assert!(short.to_new_user().is_err());
    }

    #[test]
    fn test_patch_from_form() {
        let patch = filled().to_patch().expect("patch");
        assert_eq!(patch.role, Some(Role::Admin));
        assert_eq!(patch.email.as_deref(), Some("ops@example.com"));
        assert!(patch.password.is_none());

        let bad = UserForm {
            email: "not-an-email".into(),
            ..filled()
        };
        assert!(bad.to_patch().is_err());

        let bad = UserForm {
            role: "root".into(),
            ..filled()
        };
        assert!(bad.to_patch().is_err());
    }

    #[test]
    fn test_password_form_requires_confirmation() {
        let form = PasswordForm {
            password: "abcdef".into(),
            confirm_password: "abcdeg".into(),
        };
        assert!(form.to_patch().is_err());

        let form = PasswordForm {
            password: "abcdef".into(),
            confirm_password: "abcdef".into(),
        };
        assert_eq!(form.to_patch(), Ok(UserPatch::password_reset("abcdef".into())));
    }

    #[test]
    fn test_binding_view_label() {
        let binding = UserAccount {
            id: AccountId::new(4),
            name: "North".into(),
            display_id: Some("N-4".into()),
            account_role: AccountRole::SiteAdmin,
        };
        let view = BindingView::from(&binding);
        assert_eq!(view.label, "North (N-4)");
        assert!(view.roles.iter().any(|r| r.selected && r.value == "site_admin"));
    }
}

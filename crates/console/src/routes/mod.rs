//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Health check
//!
//! # Auth
//! GET  /login                           - Login page (?next=)
//! POST /login                           - Log in
//! POST /logout                          - Log out
//!
//! # Account scope
//! POST /account/switch                  - Select another account
//! POST /account/reload                  - Retry loading accounts
//!
//! # Read-only pages
//! GET  /                                - Home overview
//! GET  /ad-plans                        - Ad plan list
//! GET  /ad-groups                       - Ad group list
//! GET  /ad-creatives                    - Ad creative list
//!
//! # Admin (requires admin console access)
//! GET  /admin                           - Redirect to dashboard
//! GET  /admin/dashboard                 - Account figures
//! POST /admin/dashboard                 - Update balance / daily budget
//! GET  /admin/ad-plans                  - Ad plans, with create form
//! POST /admin/ad-plans                  - Create
//! POST /admin/ad-plans/{id}             - Update
//! POST /admin/ad-plans/{id}/delete      - Delete
//! GET  /admin/ad-groups                 - Ad groups
//! POST /admin/ad-groups                 - Create
//! POST /admin/ad-groups/{id}            - Rename
//! POST /admin/ad-groups/{id}/delete     - Delete (only when empty)
//! POST /admin/ad-groups/{id}/plans      - Bind plans
//! POST /admin/ad-groups/{id}/plans/{plan_id}/unbind
//! GET  /admin/ad-creatives              - Ad creatives
//! POST /admin/ad-creatives              - Create
//! POST /admin/ad-creatives/{id}         - Update
//! POST /admin/ad-creatives/{id}/delete  - Delete
//!
//! # Admin, super admin only
//! GET  /admin/users                     - Users
//! POST /admin/users                     - Create
//! POST /admin/users/{id}                - Edit
//! POST /admin/users/{id}/ban            - Toggle ban
//! POST /admin/users/{id}/password       - Reset password
//! POST /admin/users/{id}/delete         - Delete
//! GET  /admin/users/{id}/accounts       - Account bindings
//! POST /admin/users/{id}/accounts       - Bind account
//! POST /admin/users/{id}/accounts/{account_id}        - Change role
//! POST /admin/users/{id}/accounts/{account_id}/unbind - Unbind
//! GET  /admin/accounts                  - Accounts
//! POST /admin/accounts                  - Create
//! POST /admin/accounts/{id}             - Edit
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod campaigns;
pub mod home;

use askama::Template;
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_sessions::Session;

use ad_console_core::{AccountId, Page, PageRequest};

use crate::api::ApiError;
use crate::error::{AppError, ErrorTemplate};
use crate::listing::{Keyed, ListState};
use crate::middleware::RequireSession;
use crate::registry::Workspace;
use crate::state::AppState;

const FLASH_KEY: &str = "flash";

/// Build the console router.
pub fn routes(admin_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(account::router())
        .merge(home::router())
        .merge(campaigns::router());

    let router = if admin_enabled {
        router.merge(admin::router())
    } else {
        router
    };

    router.fallback(not_found)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Fallback for unknown paths.
async fn not_found() -> Response {
    ErrorTemplate::respond(StatusCode::NOT_FOUND, "The page you requested does not exist")
}

/// Render a template, falling back to a plain error body.
pub(crate) fn render(template: &impl Template) -> Response {
    Html(template.render().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to render template");
        "Internal Server Error".to_string()
    }))
    .into_response()
}

// =============================================================================
// Page chrome
// =============================================================================

/// Entry in the account switcher.
#[derive(Debug, Clone)]
pub struct AccountOption {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

/// Header, navigation and notices shared by every logged-in page.
#[derive(Debug, Clone)]
pub struct Chrome {
    pub title: String,
    pub current_path: String,
    pub user_name: String,
    pub user_initial: String,
    pub role_label: String,
    pub accounts: Vec<AccountOption>,
    pub current_account: Option<String>,
    pub accounts_error: Option<String>,
    pub admin_enabled: bool,
    pub can_access_admin: bool,
    pub can_manage_users: bool,
    pub can_manage_accounts: bool,
    pub notice: Option<String>,
}

impl Chrome {
    /// Build the chrome for `path`, consuming any pending notice.
    pub async fn new(guard: &RequireSession, app: &AppState, path: &str) -> Self {
        let state = &guard.state;
        let capabilities = state.capabilities();
        let current = state.current_account_id();
        let (user_name, user_initial, role_label) = state.user().map_or_else(
            || (String::new(), String::new(), String::new()),
            |user| {
                (
                    user.name.clone(),
                    user.initial(),
                    user.role.label().to_string(),
                )
            },
        );

        Self {
            title: app.config().title.clone(),
            current_path: path.to_string(),
            user_name,
            user_initial,
            role_label,
            accounts: state
                .accounts()
                .iter()
                .map(|a| AccountOption {
                    id: a.id.to_string(),
                    label: a.label(),
                    selected: Some(a.id) == current,
                })
                .collect(),
            current_account: state.current_account().map(ad_console_core::Account::label),
            accounts_error: state.accounts_error().map(String::from),
            admin_enabled: app.config().feature_admin,
            can_access_admin: capabilities.can_access_admin(),
            can_manage_users: capabilities.can_manage_users(),
            can_manage_accounts: capabilities.can_manage_accounts(),
            notice: take_flash(&guard.session).await,
        }
    }

    /// Whether `prefix` is the active navigation section.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.current_path == "/"
        } else {
            self.current_path.starts_with(prefix)
        }
    }
}

/// Queue a notice for the next rendered page.
pub async fn set_flash(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.insert(FLASH_KEY, message.into()).await {
        tracing::warn!(error = %e, "Failed to store notice");
    }
}

async fn take_flash(session: &Session) -> Option<String> {
    session
        .remove::<String>(FLASH_KEY)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read notice");
            None
        })
}

// =============================================================================
// List helpers
// =============================================================================

/// Page, keyword and open form from a list URL.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub name: Option<String>,
    /// `new`, `edit-<id>`, `bind-<id>` or `password-<id>`.
    pub form: Option<String>,
}

/// A form opened from a list URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenForm {
    New,
    Edit(i64),
    Bind(i64),
    Password(i64),
}

impl OpenForm {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "new" {
            return Some(Self::New);
        }
        let (kind, id) = raw.split_once('-')?;
        let id = id.parse().ok()?;
        match kind {
            "edit" => Some(Self::Edit(id)),
            "bind" => Some(Self::Bind(id)),
            "password" => Some(Self::Password(id)),
            _ => None,
        }
    }
}

impl ListParams {
    #[must_use]
    pub fn open_form(&self) -> Option<OpenForm> {
        self.form.as_deref().and_then(OpenForm::parse)
    }

    /// Apply to `list` if the URL carried any list parameters. A `page`
    /// without `name` clears the keyword; navigation links use `?page=1` to
    /// start unfiltered, while bare redirects after a form keep the query.
    pub fn apply<T: Keyed>(&self, list: &mut ListState<T>) {
        if self.page.is_none() && self.name.is_none() {
            return;
        }
        let size = list.query().page_size();
        list.set_query(PageRequest::new(
            self.page.unwrap_or(1),
            size,
            self.name.as_deref(),
        ));
    }
}

/// Pagination links for a list page.
#[derive(Debug, Clone)]
pub struct Pager {
    pub page: u32,
    pub pages: u64,
    pub total: u64,
    pub keyword: String,
    pub prev: Option<u32>,
    pub next: Option<u32>,
}

impl Pager {
    pub fn of<T: Keyed>(list: &ListState<T>) -> Self {
        let query = list.query();
        let page = query.page();
        let size = u64::from(query.page_size().max(1));
        let pages = list.total().div_ceil(size).max(1);
        Self {
            page,
            pages,
            total: list.total(),
            keyword: query.keyword().unwrap_or_default().to_string(),
            prev: (page > 1).then(|| page - 1),
            next: (u64::from(page) < pages).then(|| page + 1),
        }
    }
}

/// Fetch the list's current page if the held one is stale for the selected
/// account. A response overtaken by a newer fetch or an account switch is
/// dropped.
pub(crate) async fn refresh_list<T, F, Fut>(
    guard: &RequireSession,
    select: fn(&mut Workspace) -> &mut ListState<T>,
    fetch: F,
) -> Result<(), AppError>
where
    T: Keyed,
    F: FnOnce(PageRequest, Option<AccountId>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let account = guard.state.current_account_id();
    let ticket = guard
        .console
        .with_workspace(|w| select(w).begin_refresh(account));
    let Some(ticket) = ticket else {
        return Ok(());
    };

    let result = fetch(ticket.query().clone(), ticket.account()).await;
    let page = guard.checked(result).await?;

    guard
        .console
        .with_workspace(|w| select(w).finish_fetch(ticket, page));
    Ok(())
}

/// Turn a failed form submission into the message shown above the form.
/// A lost session still aborts the request.
pub(crate) fn inline_error(e: AppError) -> Result<String, AppError> {
    match e {
        AppError::LoginRequired => Err(e),
        other => {
            tracing::warn!(error = %other, "Form submission failed");
            Ok(other.user_message())
        }
    }
}

/// `<option>` in a select box.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>, current: &str) -> Self {
        let value = value.into();
        let selected = value == current;
        Self {
            value,
            label: label.into(),
            selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_console_core::AdPlan;

    #[test]
    fn test_open_form_parse() {
        assert_eq!(OpenForm::parse("new"), Some(OpenForm::New));
        assert_eq!(OpenForm::parse("edit-12"), Some(OpenForm::Edit(12)));
        assert_eq!(OpenForm::parse("bind-3"), Some(OpenForm::Bind(3)));
        assert_eq!(OpenForm::parse("password-4"), Some(OpenForm::Password(4)));
        assert_eq!(OpenForm::parse("edit-x"), None);
        assert_eq!(OpenForm::parse("drop-1"), None);
    }

    #[test]
    fn test_list_params_only_touch_query_when_present() {
        let mut list = ListState::<AdPlan>::new(20);
        ListParams::default().apply(&mut list);
        assert_eq!(list.query(), &PageRequest::first(20));

        let params = ListParams {
            page: Some(3),
            name: Some("  spring ".into()),
            form: None,
        };
        params.apply(&mut list);
        assert_eq!(list.query().page(), 3);
        assert_eq!(list.query().page_size(), 20);
        assert_eq!(list.query().keyword(), Some("spring"));

        ListParams::default().apply(&mut list);
        assert_eq!(list.query().keyword(), Some("spring"));

        let nav = ListParams {
            page: Some(1),
            ..ListParams::default()
        };
        nav.apply(&mut list);
        assert_eq!(list.query(), &PageRequest::first(20));
    }

    #[test]
    fn test_pager_links() {
        let mut list = ListState::<AdPlan>::new(10);
        list.set_query(PageRequest::new(2, 10, Some("x")));
        let ticket = list.begin_fetch(None);
        list.finish_fetch(
            ticket,
            Page {
                items: vec![],
                total: 35,
            },
        );

        let pager = Pager::of(&list);
        assert_eq!(pager.pages, 4);
        assert_eq!(pager.prev, Some(1));
        assert_eq!(pager.next, Some(3));
        assert_eq!(pager.keyword, "x");
    }

    #[test]
    fn test_select_option_marks_current() {
        let option = SelectOption::new("app", "App promotion", "app");
        assert!(option.selected);
        assert!(!SelectOption::new("web", "Web", "app").selected);
    }
}

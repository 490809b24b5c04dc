//! Admin console route handlers.
//!
//! Every page requires admin console access in the selected account; the
//! user and account pages additionally require the super-admin
//! capabilities. Forms post to sub-paths and redirect back to the list with
//! a notice; a failed submission re-renders the list with the form open.

pub mod accounts;
pub mod ad_creatives;
pub mod ad_groups;
pub mod ad_plans;
pub mod dashboard;
mod form;
pub mod users;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use ad_console_core::Capability;

use crate::error::AppError;
use crate::middleware::RequireSession;
use crate::state::AppState;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(index))
        .route(
            "/admin/dashboard",
            get(dashboard::show).post(dashboard::update),
        )
        // Ad plans
        .route("/admin/ad-plans", get(ad_plans::index).post(ad_plans::create))
        .route("/admin/ad-plans/{id}", post(ad_plans::update))
        .route("/admin/ad-plans/{id}/delete", post(ad_plans::delete))
        // Ad groups
        .route(
            "/admin/ad-groups",
            get(ad_groups::index).post(ad_groups::create),
        )
        .route("/admin/ad-groups/{id}", post(ad_groups::rename))
        .route("/admin/ad-groups/{id}/delete", post(ad_groups::delete))
        .route("/admin/ad-groups/{id}/plans", post(ad_groups::bind))
        .route(
            "/admin/ad-groups/{id}/plans/{plan_id}/unbind",
            post(ad_groups::unbind),
        )
        // Ad creatives
        .route(
            "/admin/ad-creatives",
            get(ad_creatives::index).post(ad_creatives::create),
        )
        .route("/admin/ad-creatives/{id}", post(ad_creatives::update))
        .route("/admin/ad-creatives/{id}/delete", post(ad_creatives::delete))
        // Users
        .route("/admin/users", get(users::index).post(users::create))
        .route("/admin/users/{id}", post(users::update))
        .route("/admin/users/{id}/ban", post(users::toggle_ban))
        .route("/admin/users/{id}/password", post(users::reset_password))
        .route("/admin/users/{id}/delete", post(users::delete))
        .route(
            "/admin/users/{id}/accounts",
            get(users::accounts).post(users::bind_account),
        )
        .route(
            "/admin/users/{id}/accounts/{account_id}",
            post(users::change_account_role),
        )
        .route(
            "/admin/users/{id}/accounts/{account_id}/unbind",
            post(users::unbind_account),
        )
        // Accounts
        .route(
            "/admin/accounts",
            get(accounts::index).post(accounts::create),
        )
        .route("/admin/accounts/{id}", post(accounts::update))
}

/// GET /admin
async fn index(guard: RequireSession) -> Result<Redirect, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    Ok(Redirect::to("/admin/dashboard"))
}

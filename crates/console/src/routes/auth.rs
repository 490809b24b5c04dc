//! Login and logout route handlers.

use askama::Template;
use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use crate::api::Credentials;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{SessionContext, safe_next};
use crate::session::{LOGIN_FAILED_MESSAGE, SessionError};
use crate::state::AppState;

use super::render;

const BUSY_MESSAGE: &str = "A login is already in progress, please wait";

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    title: String,
    next: String,
    username: String,
    error: Option<String>,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Login form. The password is never logged.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Render the login page.
///
/// GET /login
#[instrument(skip_all)]
async fn login_page(
    ctx: SessionContext,
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref()).to_string();
    let manager = ctx.console.manager();
    let snapshot = manager.snapshot();
    if snapshot.is_logged_in() {
        return Redirect::to(&next).into_response();
    }

    let error = snapshot.error().map(String::from);
    if error.is_some() {
        manager.clear_error();
    }

    render(&LoginTemplate {
        title: state.config().title.clone(),
        next,
        username: String::new(),
        error,
    })
}

/// Log in and return to `next`.
///
/// POST /login
#[instrument(skip_all)]
async fn login(
    ctx: SessionContext,
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).to_string();
    let manager = ctx.console.manager();
    if manager.snapshot().is_logged_in() {
        return Redirect::to(&next).into_response();
    }

    let credentials = Credentials::new(form.username.trim(), form.password);
    match manager.login(&ctx.backend(), &credentials).await {
        Ok(user) => {
            ctx.console.with_workspace(|w| w.invalidate_all());
            set_sentry_user(user.id.as_i64(), user.username.as_deref());
            Redirect::to(&next).into_response()
        }
        Err(e) => {
            let message = match e {
                SessionError::Busy => BUSY_MESSAGE.to_string(),
                _ => {
                    let message = manager
                        .snapshot()
                        .error()
                        .unwrap_or(LOGIN_FAILED_MESSAGE)
                        .to_string();
                    manager.clear_error();
                    message
                }
            };
            let page = render(&LoginTemplate {
                title: state.config().title.clone(),
                next,
                username: form.username,
                error: Some(message),
            });
            (StatusCode::UNAUTHORIZED, page).into_response()
        }
    }
}

/// Log out and drop the console session.
///
/// POST /logout
#[instrument(skip_all)]
async fn logout(ctx: SessionContext, State(state): State<AppState>) -> Response {
    if let Err(e) = ctx.console.manager().logout(&ctx.backend()).await {
        tracing::error!(error = %e, "Failed to clear persisted session on logout");
    }
    ctx.console.with_workspace(|w| w.invalidate_all());
    state.registry().forget(ctx.console.id()).await;
    clear_sentry_user();

    Redirect::to("/login").into_response()
}

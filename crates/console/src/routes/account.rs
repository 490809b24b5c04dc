//! Account scope: switching and reloading the account list.

use axum::{
    Form, Router,
    response::{IntoResponse, Redirect, Response},
    routing::post,
};
use serde::Deserialize;
use tracing::instrument;

use ad_console_core::AccountId;

use crate::error::AppError;
use crate::middleware::{RequireSession, safe_next};
use crate::session::SessionError;
use crate::state::AppState;

use super::set_flash;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account/switch", post(switch))
        .route("/account/reload", post(reload))
}

#[derive(Debug, Deserialize)]
pub struct SwitchForm {
    pub account_id: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReloadForm {
    #[serde(default)]
    pub next: Option<String>,
}

/// Select another of the user's accounts. Every page list is dropped so the
/// next visit fetches the new account's records.
///
/// POST /account/switch
#[instrument(skip_all)]
async fn switch(guard: RequireSession, Form(form): Form<SwitchForm>) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref()).to_string();
    let id: AccountId = form
        .account_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid account".to_string()))?;

    if guard.state.current_account_id() == Some(id) {
        return Ok(Redirect::to(&next).into_response());
    }

    match guard
        .console
        .manager()
        .switch_account(&guard.session, id)
        .await
    {
        Ok(account) => {
            guard.console.with_workspace(|w| w.invalidate_all());
            set_flash(&guard.session, format!("Switched to {}", account.label())).await;
        }
        Err(SessionError::AccountNotFound(_)) => {
            set_flash(&guard.session, "That account is not available").await;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Redirect::to(&next).into_response())
}

/// Retry loading the account list after a failure.
///
/// POST /account/reload
#[instrument(skip_all)]
async fn reload(guard: RequireSession, Form(form): Form<ReloadForm>) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref()).to_string();
    let manager = guard.console.manager();
    let before = guard.state.current_account_id();

    match manager.load_accounts(&guard.backend()).await {
        Ok(()) => {
            if manager.snapshot().current_account_id() != before {
                guard.console.with_workspace(|w| w.invalidate_all());
            }
            set_flash(&guard.session, "Accounts reloaded").await;
        }
        Err(e) if e.is_unauthorized() => {
            guard.console.with_workspace(|w| w.invalidate_all());
            return Err(AppError::LoginRequired);
        }
        // Recorded as the accounts error and shown in the header.
        Err(e) => tracing::warn!(error = %e, "Account reload failed"),
    }

    Ok(Redirect::to(&next).into_response())
}

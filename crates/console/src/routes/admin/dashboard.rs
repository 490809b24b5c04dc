//! Admin dashboard: the selected account's figures.

use askama::Template;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use ad_console_core::{Account, AccountUpdate, Capability, InputError};

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::{Chrome, inline_error, render, set_flash};
use crate::state::AppState;

use super::form;

const PATH: &str = "/admin/dashboard";

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct DashboardTemplate {
    chrome: Chrome,
    account: Option<Account>,
    form: FinanceForm,
    can_edit: bool,
    error: Option<String>,
}

/// Balance, today's cost and daily budget.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FinanceForm {
    pub balance: String,
    pub today_cost: String,
    pub daily_budget: String,
}

impl FinanceForm {
    fn from_account(account: &Account) -> Self {
        Self {
            balance: form::decimal_value(account.balance),
            today_cost: form::decimal_value(account.today_cost),
            daily_budget: form::decimal_value(account.daily_budget),
        }
    }

    /// Only filled-in fields are sent.
    fn to_update(&self) -> Result<AccountUpdate, InputError> {
        let update = AccountUpdate {
            balance: form::optional_decimal("balance", &self.balance)?,
            today_cost: form::optional_decimal("today's cost", &self.today_cost)?,
            daily_budget: form::optional_decimal("daily budget", &self.daily_budget)?,
            ..AccountUpdate::default()
        };
        if update.is_empty() {
            return Err(InputError::Invalid("nothing to update".to_string()));
        }
        for (field, value) in [
            ("balance", update.balance),
            ("today's cost", update.today_cost),
            ("daily budget", update.daily_budget),
        ] {
            if value.is_some_and(|v| v.is_sign_negative()) {
                return Err(InputError::Invalid(format!("{field} cannot be negative")));
            }
        }
        Ok(update)
    }
}

/// GET /admin/dashboard
#[instrument(skip_all)]
pub async fn show(guard: RequireSession, State(state): State<AppState>) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    render_page(&guard, &state, None, None).await
}

/// POST /admin/dashboard
#[instrument(skip_all)]
pub async fn update(
    guard: RequireSession,
    State(state): State<AppState>,
    Form(input): Form<FinanceForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::AccessAdminConsole)?;
    guard.require(Capability::ManageAccountFinance)?;
    let Some(account) = guard.state.current_account_id() else {
        return Err(AppError::BadRequest("Select an account first".to_string()));
    };

    let result = match input.to_update() {
        Ok(update) => {
            let result = guard.backend().update_account(account, &update).await;
            guard.checked(result).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => {
            tracing::info!(account_id = %account, "Account figures updated");
            // The header shows the figures from the session's account list.
            if let Err(e) = guard.console.manager().load_accounts(&guard.backend()).await {
                tracing::warn!(error = %e, "Failed to reload accounts after update");
            }
            set_flash(&guard.session, "Account updated").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(input), Some(message)).await
        }
    }
}

async fn render_page(
    guard: &RequireSession,
    state: &AppState,
    form: Option<FinanceForm>,
    error: Option<String>,
) -> Result<Response, AppError> {
    let account = match guard.state.current_account_id() {
        Some(id) => {
            let result = guard.backend().account_overview(Some(id)).await;
            Some(guard.checked(result).await?)
        }
        None => None,
    };
    let form = form.unwrap_or_else(|| {
        account
            .as_ref()
            .map(FinanceForm::from_account)
            .unwrap_or_default()
    });

    Ok(render(&DashboardTemplate {
        chrome: Chrome::new(guard, state, PATH).await,
        can_edit: account.is_some() && guard.state.capabilities().can_manage_finance(),
        account,
        form,
        error,
    }))
}

//! Account administration. Super admins only.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use ad_console_core::{
    AccountId, AccountRecord, AccountUpdate, Capability, InputError, NewAccount, Page,
    campaign::MAX_NAME_LENGTH, validation::required_text,
};

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::{
    Chrome, ListParams, OpenForm, Pager, inline_error, refresh_list, render, set_flash,
};
use crate::state::AppState;

use super::form;

const PATH: &str = "/admin/accounts";

#[derive(Template)]
#[template(path = "admin/accounts.html")]
struct AccountsTemplate {
    chrome: Chrome,
    accounts: Vec<AccountRecord>,
    pager: Pager,
    list_path: &'static str,
    editor: Option<AccountEditor>,
    error: Option<String>,
}

struct AccountEditor {
    title: &'static str,
    action: String,
    values: AccountForm,
}

enum Editor {
    Create(AccountForm),
    Update(AccountId, AccountForm),
}

impl Editor {
    fn view(self) -> AccountEditor {
        match self {
            Self::Create(values) => AccountEditor {
                title: "New account",
                action: PATH.to_string(),
                values,
            },
            Self::Update(id, values) => AccountEditor {
                title: "Edit account",
                action: format!("{PATH}/{id}"),
                values,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountForm {
    pub name: String,
    pub display_id: String,
    pub balance: String,
    pub daily_budget: String,
}

impl From<&AccountRecord> for AccountForm {
    fn from(account: &AccountRecord) -> Self {
        Self {
            name: account.name.clone(),
            display_id: account.display_id.clone().unwrap_or_default(),
            balance: form::decimal_value(account.balance),
            daily_budget: form::decimal_value(account.daily_budget),
        }
    }
}

impl AccountForm {
    fn to_new_account(&self) -> Result<NewAccount, InputError> {
        required_text("name", &self.name, MAX_NAME_LENGTH)?;
        let account = NewAccount {
            name: self.name.trim().to_string(),
            display_id: form::optional_text(&self.display_id),
            balance: form::decimal("balance", &self.balance)?,
            daily_budget: form::decimal("daily budget", &self.daily_budget)?,
        };
        if account.balance.is_sign_negative() || account.daily_budget.is_sign_negative() {
            return Err(InputError::Invalid("amounts cannot be negative".to_string()));
        }
        Ok(account)
    }

    fn to_update(&self) -> Result<AccountUpdate, InputError> {
        required_text("name", &self.name, MAX_NAME_LENGTH)?;
        let update = AccountUpdate {
            name: Some(self.name.trim().to_string()),
            display_id: form::optional_text(&self.display_id),
            balance: form::optional_decimal("balance", &self.balance)?,
            daily_budget: form::optional_decimal("daily budget", &self.daily_budget)?,
            today_cost: None,
        };
        if update.balance.is_some_and(|v| v.is_sign_negative())
            || update.daily_budget.is_some_and(|v| v.is_sign_negative())
        {
            return Err(InputError::Invalid("amounts cannot be negative".to_string()));
        }
        Ok(update)
    }
}

/// GET /admin/accounts
#[instrument(skip_all)]
pub async fn index(
    guard: RequireSession,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageAccounts)?;
    guard.console.with_workspace(|w| params.apply(&mut w.accounts));
    refresh(&guard).await?;

    let editor = match params.open_form() {
        Some(OpenForm::New) => Some(Editor::Create(AccountForm {
            balance: "0".to_string(),
            daily_budget: "0".to_string(),
            ..AccountForm::default()
        })),
        Some(OpenForm::Edit(id)) => {
            let id = AccountId::new(id);
            guard
                .console
                .with_workspace(|w| w.accounts.get(id).map(AccountForm::from))
                .map(|values| Editor::Update(id, values))
        }
        _ => None,
    };
    render_page(&guard, &state, editor, None).await
}

/// POST /admin/accounts
#[instrument(skip_all)]
pub async fn create(
    guard: RequireSession,
    State(state): State<AppState>,
    Form(values): Form<AccountForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageAccounts)?;

    let result = match values.to_new_account() {
        Ok(account) => {
            let result = guard.backend().create_account(&account).await;
            guard.checked(result).await
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(account) => {
            tracing::info!(account_id = %account.id, "Account created");
            guard.console.with_workspace(|w| w.accounts.prepend(account));
            set_flash(&guard.session, "Account created").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Create(values)), Some(message)).await
        }
    }
}

/// POST /admin/accounts/{id}
#[instrument(skip_all, fields(account_id = %id))]
pub async fn update(
    guard: RequireSession,
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Form(values): Form<AccountForm>,
) -> Result<Response, AppError> {
    guard.require(Capability::ManageAccounts)?;

    let result = match values.to_update() {
        Ok(update) => {
            let result = guard.backend().update_account(id, &update).await;
            guard.checked(result).await.map(|()| update)
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(update) => {
            tracing::info!("Account updated");
            let merged = guard
                .console
                .with_workspace(|w| w.accounts.merge(id, |a| a.apply_update(&update)));
            if merged.is_err() {
                guard.console.with_workspace(|w| w.accounts.mark_stale());
            }
            // Names and figures in the switcher come from the session.
            if guard.state.accounts().iter().any(|a| a.id == id) {
                if let Err(e) = guard.console.manager().load_accounts(&guard.backend()).await {
                    tracing::warn!(error = %e, "Failed to reload accounts after update");
                }
            }
            set_flash(&guard.session, "Account updated").await;
            Ok(Redirect::to(PATH).into_response())
        }
        Err(e) => {
            let message = inline_error(e)?;
            render_page(&guard, &state, Some(Editor::Update(id, values)), Some(message)).await
        }
    }
}

async fn refresh(guard: &RequireSession) -> Result<(), AppError> {
    let backend = guard.backend();
    refresh_list(guard, |w| &mut w.accounts, |query, _account| async move {
        backend
            .all_accounts()
            .await
            .map(|accounts| Page::from_all(accounts, &query, |a| a.name.as_str()))
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
    let (accounts, pager) = guard
        .console
        .with_workspace(|w| (w.accounts.items().to_vec(), Pager::of(&w.accounts)));

    Ok(render(&AccountsTemplate {
        chrome: Chrome::new(guard, state, PATH).await,
        accounts,
        pager,
        list_path: PATH,
        editor: editor.map(Editor::view),
        error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_new_account_requires_amounts() {
        let values = AccountForm {
            name: "North".into(),
            balance: "1,000".into(),
            daily_budget: "50".into(),
            ..AccountForm::default()
        };
        let account = values.to_new_account().expect("account");
        assert_eq!(account.balance, Decimal::from(1000));
        assert_eq!(account.display_id, None);

        let missing = AccountForm {
            daily_budget: String::new(),
            ..values
        };
        assert!(missing.to_new_account().is_err());
    }

    #[test]
    fn test_update_skips_blank_amounts() {
        let values = AccountForm {
            name: "North".into(),
            display_id: "N-1".into(),
            balance: String::new(),
            daily_budget: "80".into(),
        };
        let update = values.to_update().expect("update");
        assert_eq!(update.name.as_deref(), Some("North"));
        assert_eq!(update.balance, None);
        assert_eq!(update.daily_budget, Some(Decimal::from(80)));
        assert_eq!(update.today_cost, None);
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let values = AccountForm {
            name: "North".into(),
            balance: "-1".into(),
            daily_budget: "0".into(),
            ..AccountForm::default()
        };
        assert!(values.to_new_account().is_err());
        assert!(values.to_update().is_err());
    }
}

//! Account endpoints: the caller's own accounts and account administration.

use reqwest::Method;

use ad_console_core::{Account, AccountId, AccountRecord, AccountUpdate, NewAccount};

use super::{ApiError, Backend, account_query};

impl Backend<'_> {
    /// `GET /users/accounts`: accounts the logged-in user may act in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn my_accounts(&self) -> Result<Vec<Account>, ApiError> {
        Ok(self
            .send::<(), Vec<Account>>(Method::GET, "/users/accounts", &[], None)
            .await?
            .unwrap_or_default())
    }

    /// `GET /admin/account`: figures for one account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn account_overview(&self, account: Option<AccountId>) -> Result<Account, ApiError> {
        let query: Vec<_> = account_query(account).into_iter().collect();
        self.fetch::<(), _>(Method::GET, "/admin/account", &query, None)
            .await
    }

    /// `PUT /admin/account/:id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn update_account(
        &self,
        id: AccountId,
        update: &AccountUpdate,
    ) -> Result<(), ApiError> {
        self.execute(Method::PUT, &format!("/admin/account/{id}"), &[], Some(update))
            .await
    }

    /// `GET /admin/account/list`: every account (super-admin).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn all_accounts(&self) -> Result<Vec<AccountRecord>, ApiError> {
        Ok(self
            .send::<(), Vec<AccountRecord>>(Method::GET, "/admin/account/list", &[], None)
            .await?
            .unwrap_or_default())
    }

    /// `POST /admin/account`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn create_account(&self, account: &NewAccount) -> Result<AccountRecord, ApiError> {
        self.fetch(Method::POST, "/admin/account", &[], Some(account))
            .await
    }
}

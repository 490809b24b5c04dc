//! User administration endpoints (super-admin).

use reqwest::Method;
use serde::Deserialize;

use ad_console_core::{AccountBinding, AccountId, ManagedUser, NewUser, UserAccount, UserId, UserPatch};

use super::{ApiError, Backend};

#[derive(Deserialize)]
struct CreatedUser {
    user: ManagedUser,
}

#[derive(Deserialize)]
struct UserAccounts {
    #[serde(default)]
    accounts: Vec<UserAccount>,
}

impl Backend<'_> {
    /// `GET /admin/users`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn list_users(&self) -> Result<Vec<ManagedUser>, ApiError> {
        Ok(self
            .send::<(), Vec<ManagedUser>>(Method::GET, "/admin/users", &[], None)
            .await?
            .unwrap_or_default())
    }

    /// `GET /admin/users/:id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn get_user(&self, id: UserId) -> Result<ManagedUser, ApiError> {
        self.fetch::<(), _>(Method::GET, &format!("/admin/users/{id}"), &[], None)
            .await
    }

    /// `POST /admin/users`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn create_user(&self, user: &NewUser) -> Result<ManagedUser, ApiError> {
        let created: CreatedUser = self
            .fetch(Method::POST, "/admin/users", &[], Some(user))
            .await?;
        Ok(created.user)
    }

    /// `PUT /admin/users/:id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<(), ApiError> {
        self.execute(Method::PUT, &format!("/admin/users/{id}"), &[], Some(patch))
            .await
    }

    /// `DELETE /admin/users/:id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn delete_user(&self, id: UserId) -> Result<(), ApiError> {
        self.execute::<()>(Method::DELETE, &format!("/admin/users/{id}"), &[], None)
            .await
    }

    /// `GET /admin/users/:id/accounts`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn user_accounts(&self, id: UserId) -> Result<Vec<UserAccount>, ApiError> {
        let accounts: Option<UserAccounts> = self
            .send::<(), _>(
                Method::GET,
                &format!("/admin/users/{id}/accounts"),
                &[],
                None,
            )
            .await?;
        Ok(accounts.map(|a| a.accounts).unwrap_or_default())
    }

    /// `POST /admin/users/:id/accounts`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn bind_user_account(
        &self,
        id: UserId,
        binding: AccountBinding,
    ) -> Result<(), ApiError> {
        self.execute(
            Method::POST,
            &format!("/admin/users/{id}/accounts"),
            &[],
            Some(&binding),
        )
        .await
    }

    /// `PUT /admin/users/:id/accounts`: change the user's role in an account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn update_user_account_role(
        &self,
        id: UserId,
        binding: AccountBinding,
    ) -> Result<(), ApiError> {
        self.execute(
            Method::PUT,
            &format!("/admin/users/{id}/accounts"),
            &[],
            Some(&binding),
        )
        .await
    }

    /// `DELETE /admin/users/:id/accounts/:account_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn unbind_user_account(
        &self,
        id: UserId,
        account_id: AccountId,
    ) -> Result<(), ApiError> {
        self.execute::<()>(
            Method::DELETE,
            &format!("/admin/users/{id}/accounts/{account_id}"),
            &[],
            None,
        )
        .await
    }
}

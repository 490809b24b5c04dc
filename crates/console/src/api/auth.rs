//! Authentication endpoints.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use ad_console_core::UserProfile;

use super::{ApiError, Backend};

/// Username and password from the login form.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct TokenBody<'a> {
    token: &'a str,
}

/// Successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "userInfo")]
    pub user_info: UserProfile,
}

/// Result of token validation. The backend may include a fresh profile.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenValidation {
    #[serde(default)]
    pub valid: bool,
    #[serde(default, rename = "userInfo")]
    pub user_info: Option<UserProfile>,
}

impl Backend<'_> {
    /// `POST /auth/login`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or rejected credentials.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        tracing::info!(username = %credentials.username, "Login attempt");
        let body = LoginBody {
            username: credentials.username.trim(),
            password: credentials.password.expose_secret(),
        };
        self.fetch(Method::POST, "/auth/login", &[], Some(&body)).await
    }

    /// `POST /auth/logout`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.execute::<()>(Method::POST, "/auth/logout", &[], None)
            .await
    }

    /// `POST /auth/validate-token`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails. An invalid token is
    /// reported either as `valid: false` or as [`ApiError::Unauthorized`],
    /// depending on the backend.
    pub async fn validate_token(&self, token: &str) -> Result<TokenValidation, ApiError> {
        let body = TokenBody { token };
        self.fetch(Method::POST, "/auth/validate-token", &[], Some(&body))
            .await
    }

    /// `GET /auth/user`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend call fails.
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.fetch::<(), _>(Method::GET, "/auth/user", &[], None)
            .await
    }
}

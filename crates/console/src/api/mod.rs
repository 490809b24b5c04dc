//! REST client for the advertising backend.
//!
//! Every response is wrapped in an envelope:
//!
//! ```json
//! { "success": true,  "data": { ... } }
//! { "success": false, "message": "plan name already exists" }
//! ```
//!
//! The bearer token is read from the caller's [`SessionStorage`] on every
//! request, and a rotated token returned in the `X-New-Token` header of a
//! successful response is written back to it.
//!
//! Endpoint groups live in their own files as `impl Backend` blocks.

mod accounts;
mod ad_creatives;
mod ad_groups;
mod ad_plans;
mod auth;
mod home;
mod users;

pub use accounts::*;
pub use ad_creatives::*;
pub use ad_groups::*;
pub use ad_plans::*;
pub use auth::*;
pub use home::*;
pub use users::*;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use ad_console_core::{AccountId, PageRequest};

use crate::storage::{Persisted, SessionStorage, StorageError};

/// Header carrying a refreshed bearer token.
pub const NEW_TOKEN_HEADER: &str = "x-new-token";

/// Errors from a backend call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("network error: {0}")]
    Transport(#[source] reqwest::Error),

    /// HTTP 401: the token is missing, expired or revoked.
    #[error("unauthorized, please log in again")]
    Unauthorized,

    /// HTTP 403.
    #[error("access denied")]
    Forbidden,

    /// HTTP 404.
    #[error("resource not found")]
    NotFound,

    /// Any other non-success HTTP status.
    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },

    /// The envelope reported `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// The body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Reading or writing the token failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The client could not be built.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Whether the session's token is no longer accepted. Callers force a
    /// logout on this.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Message safe to show on a page.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "Network connection failed, please try again".to_string(),
            Self::Status { status, message } => match status {
                500 => "Internal server error".to_string(),
                502 => "Bad gateway".to_string(),
                503 => "Service unavailable".to_string(),
                504 => "Gateway timeout".to_string(),
                _ if message.is_empty() => format!("Request failed ({status})"),
                _ => message.clone(),
            },
            Self::Decode(_) | Self::Storage(_) | Self::Config(_) => {
                "Unexpected response from server".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e)
        }
    }
}

/// Response envelope.
#[derive(Debug, serde::Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

/// Error body on non-2xx responses; only the message is used.
#[derive(Debug, Default, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Shared HTTP client for the backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:3000/api`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // A trailing slash makes `Url::join` append instead of replacing the
        // last segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalized).map_err(|e| ApiError::Config(format!("{base_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ad-console/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ApiClientInner { http, base_url }),
        })
    }

    /// The API root.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Bind the client to one session's storage.
    #[must_use]
    pub fn backend<'a>(&'a self, storage: &'a dyn SessionStorage) -> Backend<'a> {
        Backend {
            client: self,
            storage,
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Config(format!("{path}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// The API client acting for one session.
///
/// Cheap to construct; handlers build one per request from the shared
/// [`ApiClient`] and the request's storage.
#[derive(Clone, Copy)]
pub struct Backend<'a> {
    client: &'a ApiClient,
    storage: &'a dyn SessionStorage,
}

impl<'a> Backend<'a> {
    /// Typed access to the session's persisted values.
    #[must_use]
    pub fn persisted(&self) -> Persisted<'a> {
        Persisted::new(self.storage)
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.client.url(path, query)?;
        let mut request = self.client.inner.http.request(method.clone(), url);

        if let Some(token) = self.persisted().token().await? {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::Unauthorized)?;
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, path, "API request");
        let response = request.send().await.map_err(ApiError::from)?;
        let status = response.status();

        if !status.is_success() {
            tracing::warn!(%method, path, status = status.as_u16(), "API request failed");
            return Err(match status.as_u16() {
                401 => ApiError::Unauthorized,
                403 => ApiError::Forbidden,
                404 => ApiError::NotFound,
                code => {
                    let message = response
                        .json::<ErrorBody>()
                        .await
                        .unwrap_or_default()
                        .message
                        .unwrap_or_default();
                    ApiError::Status {
                        status: code,
                        message,
                    }
                }
            });
        }

        if let Some(token) = response
            .headers()
            .get(NEW_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
        {
            tracing::debug!("Persisting rotated token");
            self.persisted().set_token(token).await?;
        }

        let bytes = response.bytes().await.map_err(ApiError::from)?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;

        if envelope.success {
            Ok(envelope.data)
        } else {
            let message = envelope
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "request failed".to_string());
            tracing::warn!(%method, path, reason = %message, "API rejected request");
            Err(ApiError::Rejected(message))
        }
    }

    /// Call an endpoint whose `data` is required.
    async fn fetch<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.send(method, path, query, body)
            .await?
            .ok_or_else(|| ApiError::Decode(format!("{path}: missing data")))
    }

    /// Call an endpoint for its effect, ignoring `data`.
    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.send::<B, serde::de::IgnoredAny>(method, path, query, body)
            .await
            .map(|_| ())
    }
}

/// Request body with the selected account attached as `accountId`.
#[derive(Serialize)]
struct Scoped<'a, T: Serialize> {
    #[serde(flatten)]
    body: &'a T,
    #[serde(rename = "accountId", skip_serializing_if = "Option::is_none")]
    account_id: Option<AccountId>,
}

/// Query pairs for a list page, scoped to an account.
fn list_query(page: &PageRequest, account: Option<AccountId>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("page", page.page().to_string()),
        ("pageSize", page.page_size().to_string()),
    ];
    if let Some(keyword) = page.keyword() {
        query.push(("name", keyword.to_string()));
    }
    query.extend(account_query(account));
    query
}

fn account_query(account: Option<AccountId>) -> Option<(&'static str, String)> {
    account.map(|id| ("accountId", id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:3000/api", Duration::from_secs(1)).expect("client")
    }

    #[test]
    fn test_paths_append_to_base() {
        let url = client().url("/ad-plans", &[]).expect("url");
        assert_eq!(url.as_str(), "http://localhost:3000/api/ad-plans");

        let trailing = ApiClient::new("http://localhost:3000/api/", Duration::from_secs(1))
            .expect("client")
            .url("auth/login", &[])
            .expect("url");
        assert_eq!(trailing.as_str(), "http://localhost:3000/api/auth/login");
    }

    #[test]
    fn test_list_query_encodes_keyword() {
        let page = PageRequest::new(2, 10, Some(" spring sale "));
        let query = list_query(&page, Some(AccountId::new(7)));
        let url = client().url("/ad-plans", &query).expect("url");
        assert_eq!(
            url.query(),
            Some("page=2&pageSize=10&name=spring+sale&accountId=7")
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        assert!(matches!(
            ApiClient::new("not a url", Duration::from_secs(1)),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn test_user_messages_hide_internals() {
        assert_eq!(
            ApiError::Decode("expected map at line 1".into()).user_message(),
            "Unexpected response from server"
        );
        assert_eq!(
            ApiError::Status {
                status: 502,
                message: "upstream".into()
            }
            .user_message(),
            "Bad gateway"
        );
        assert_eq!(
            ApiError::Rejected("name taken".into()).user_message(),
            "name taken"
        );
    }

    #[test]
    fn test_scoped_body_flattens_account() {
        #[derive(Serialize)]
        struct Body {
            name: &'static str,
        }
        let value = serde_json::to_value(Scoped {
            body: &Body { name: "g" },
            account_id: Some(AccountId::new(3)),
        })
        .expect("serialize");
        assert_eq!(value, serde_json::json!({"name": "g", "accountId": 3}));
    }
}

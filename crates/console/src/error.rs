//! Unified error handling for the console.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

use ad_console_core::InputError;

use crate::api::ApiError;
use crate::filters;
use crate::session::SessionError;
use crate::storage::StorageError;

/// Application-level error type for console handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Session operation failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Cookie session store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The session is gone; the user must log in again.
    #[error("Login required")]
    LoginRequired,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_login_required(&self) -> bool {
        matches!(
            self,
            Self::LoginRequired
                | Self::Api(ApiError::Unauthorized)
                | Self::Session(SessionError::NotLoggedIn | SessionError::Api(ApiError::Unauthorized))
        )
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage(_)
                | Self::Internal(_)
                | Self::Api(
                    ApiError::Transport(_)
                        | ApiError::Status { .. }
                        | ApiError::Decode(_)
                        | ApiError::Storage(_)
                        | ApiError::Config(_)
                )
                | Self::Session(SessionError::Storage(_))
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::LoginRequired => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Api(e) | Self::Session(SessionError::Api(e)) => api_status(e),
            Self::Session(SessionError::Busy) => StatusCode::CONFLICT,
            Self::Session(SessionError::NotLoggedIn) => StatusCode::UNAUTHORIZED,
            Self::Session(SessionError::AccountNotFound(_)) => StatusCode::BAD_REQUEST,
            Self::Session(SessionError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Storage(_) | Self::Internal(_) | Self::Session(SessionError::Storage(_)) => {
                "Internal server error".to_string()
            }
            Self::Api(e) | Self::Session(SessionError::Api(e)) => e.user_message(),
            Self::Forbidden(_) => "Insufficient permission".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(message) => message.clone(),
            Self::LoginRequired => "Please log in again".to_string(),
            Self::Session(e) => e.to_string(),
        }
    }
}

impl From<InputError> for AppError {
    fn from(e: InputError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

fn api_status(e: &ApiError) -> StatusCode {
    match e {
        ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiError::Forbidden => StatusCode::FORBIDDEN,
        ApiError::NotFound => StatusCode::NOT_FOUND,
        ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
        ApiError::Storage(_) | ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ApiError::Transport(_) | ApiError::Status { .. } | ApiError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Stand-alone error page.
#[derive(Template)]
#[template(path = "errors/error.html")]
pub struct ErrorTemplate {
    pub status: u16,
    pub title: String,
    pub message: String,
}

impl ErrorTemplate {
    /// Render with `status`.
    #[must_use]
    pub fn respond(status: StatusCode, message: impl Into<String>) -> Response {
        let template = Self {
            status: status.as_u16(),
            title: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: message.into(),
        };
        let body = template.render().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to render error template");
            "Internal Server Error".to_string()
        });
        (status, Html(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_login_required() {
            return Redirect::to("/login").into_response();
        }

        // Log server errors with Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Console request error"
            );
        } else {
            tracing::debug!(error = %self, "Console request rejected");
        }

        ErrorTemplate::respond(self.status(), self.user_message())
    }
}

/// Set the Sentry user context for the logged-in user.
pub fn set_sentry_user(user_id: i64, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("ad plan 3".to_string());
        assert_eq!(err.to_string(), "Not found: ad plan 3");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            status_of(AppError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Forbidden("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AppError::BadRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::Api(ApiError::Rejected("taken".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Session(SessionError::Busy)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_unauthorized_redirects_to_login() {
        for err in [
            AppError::LoginRequired,
            AppError::Api(ApiError::Unauthorized),
            AppError::Session(SessionError::Api(ApiError::Unauthorized)),
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(
                response
                    .headers()
                    .get(axum::http::header::LOCATION)
                    .and_then(|v| v.to_str().ok()),
                Some("/login")
            );
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("pool exhausted at db.rs:42".into());
        assert_eq!(err.user_message(), "Internal server error");

        let err = AppError::Api(ApiError::Decode("expected map".into()));
        assert_eq!(err.user_message(), "Unexpected response from server");
    }
}

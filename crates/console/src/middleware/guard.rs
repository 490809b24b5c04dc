//! Route guard and session extractors.
//!
//! [`decide`] is the whole policy: while the browser session is still being
//! restored show a placeholder, once resolved send anonymous visitors to the
//! login page and let everyone else through. [`RequireSession`] applies it to
//! a request.

use std::ops::Deref;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use ad_console_core::Capability;

use crate::api::{ApiClient, ApiError, Backend};
use crate::error::{AppError, ErrorTemplate};
use crate::filters;
use crate::registry::ConsoleSession;
use crate::session::SessionState;
use crate::state::AppState;

/// What to do with a request for a protected page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The session is still resolving; show the loading page.
    Placeholder,
    /// Not logged in; go to the login page and come back to `next`.
    RedirectToLogin { next: String },
    /// Run the handler.
    Render,
}

/// Decide how to answer a request for `path` (path and query).
#[must_use]
pub fn decide(state: &SessionState, path: &str) -> GuardDecision {
    if state.loading() {
        GuardDecision::Placeholder
    } else if state.is_logged_in() {
        GuardDecision::Render
    } else {
        GuardDecision::RedirectToLogin {
            next: safe_next(Some(path)).to_string(),
        }
    }
}

/// A post-login target that stays on this site. Anything else becomes `/`.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.starts_with("/login") =>
        {
            path
        }
        _ => "/",
    }
}

/// Login page URL that returns to `next`.
#[must_use]
pub fn login_location(next: &str) -> String {
    match safe_next(Some(next)) {
        "/" => "/login".to_string(),
        path => format!("/login?next={}", urlencoding::encode(path)),
    }
}

/// Placeholder shown while the session resolves. Refreshes itself.
#[derive(Template)]
#[template(path = "auth/loading.html")]
struct LoadingTemplate {
    target: String,
}

/// Rejection from the session extractors.
#[derive(Debug)]
pub enum GuardRejection {
    Placeholder { target: String },
    RedirectToLogin { next: String },
    /// The cookie session layer is missing or its store failed.
    Unavailable,
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Placeholder { target } => {
                let body = LoadingTemplate { target }.render().unwrap_or_else(|e| {
                    tracing::error!(error = %e, "Failed to render loading template");
                    "Loading...".to_string()
                });
                Html(body).into_response()
            }
            Self::RedirectToLogin { next } => Redirect::to(&login_location(&next)).into_response(),
            Self::Unavailable => ErrorTemplate::respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session unavailable, please try again",
            ),
        }
    }
}

/// The console session of the current browser session, without any login
/// requirement. Used by the login and logout handlers.
pub struct SessionContext {
    pub console: Arc<ConsoleSession>,
    pub session: Session,
    api: ApiClient,
}

impl SessionContext {
    /// The backend client acting for this session.
    #[must_use]
    pub fn backend(&self) -> Backend<'_> {
        self.api.backend(&self.session)
    }

    /// Pass a backend result through, logging the session out on 401.
    ///
    /// # Errors
    ///
    /// Returns the API error as an [`AppError`]; an unauthorized response
    /// becomes [`AppError::LoginRequired`].
    pub async fn checked<T>(&self, result: Result<T, ApiError>) -> Result<T, AppError> {
        match result {
            Err(ApiError::Unauthorized) => {
                tracing::info!("Backend rejected session token, logging out");
                self.console.workspace().invalidate_all();
                self.console.manager().force_logout(&self.session).await?;
                Err(AppError::LoginRequired)
            }
            other => other.map_err(AppError::from),
        }
    }

    async fn resolve(parts: &Parts, app: &AppState) -> Result<Self, GuardRejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(GuardRejection::Unavailable)?;
        let console = app.registry().resolve(&session).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to resolve console session");
            GuardRejection::Unavailable
        })?;
        Ok(Self {
            console,
            session,
            api: app.api().clone(),
        })
    }
}

impl<S> FromRequestParts<S> for SessionContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let ctx = Self::resolve(parts, &app).await?;
        if let Err(e) = ctx.console.manager().initialize(&ctx.backend()).await {
            tracing::warn!(error = %e, "Session initialization failed");
        }
        Ok(ctx)
    }
}

/// Extractor for pages that need a logged-in user.
///
/// Resolves the session without waiting on another request's
/// initialization, then applies [`decide`].
pub struct RequireSession {
    ctx: SessionContext,
    /// Session state as of the start of the request.
    pub state: SessionState,
}

impl Deref for RequireSession {
    type Target = SessionContext;

    fn deref(&self) -> &SessionContext {
        &self.ctx
    }
}

impl RequireSession {
    /// Fail with an in-page 403 unless the user holds `capability` in the
    /// selected account.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`].
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.state.capabilities().contains(capability) {
            Ok(())
        } else {
            tracing::info!(?capability, "Capability check failed");
            Err(AppError::Forbidden(format!("{capability:?}")))
        }
    }

    /// Re-read the session state after a mutation.
    pub fn refresh(&mut self) {
        self.state = self.ctx.console.manager().snapshot();
    }
}

impl<S> FromRequestParts<S> for RequireSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let ctx = SessionContext::resolve(parts, &app).await?;

        if let Err(e) = ctx
            .console
            .manager()
            .initialize_or_pending(&ctx.backend())
            .await
        {
            tracing::warn!(error = %e, "Session initialization failed");
        }

        let snapshot = ctx.console.manager().snapshot();
        let path = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());

        match decide(&snapshot, path) {
            GuardDecision::Render => {
                if let Some(user) = snapshot.user() {
                    crate::error::set_sentry_user(user.id.as_i64(), user.username.as_deref());
                }
                Ok(Self {
                    ctx,
                    state: snapshot,
                })
            }
            GuardDecision::Placeholder => Err(GuardRejection::Placeholder {
                target: path.to_string(),
            }),
            GuardDecision::RedirectToLogin { next } => {
                Err(GuardRejection::RedirectToLogin { next })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionAction;
    use ad_console_core::{Role, UserId, UserProfile};

    fn logged_in() -> SessionState {
        let mut state = SessionState::default();
        state.apply(SessionAction::LoginStart);
        state.apply(SessionAction::LoginSuccess(UserProfile {
            id: UserId::new(1),
            name: "A".into(),
            username: None,
            email: None,
            role: Role::User,
            avatar: None,
        }));
        state
    }

    fn logged_out() -> SessionState {
        let mut state = SessionState::default();
        state.apply(SessionAction::Logout);
        state
    }

    #[test]
    fn test_unresolved_session_shows_placeholder() {
        assert_eq!(
            decide(&SessionState::default(), "/ad-plans"),
            GuardDecision::Placeholder
        );

        let mut logging_in = logged_out();
        logging_in.apply(SessionAction::LoginStart);
        assert_eq!(decide(&logging_in, "/"), GuardDecision::Placeholder);
    }

    #[test]
    fn test_logged_out_redirects_with_next() {
        assert_eq!(
            decide(&logged_out(), "/admin/ad-plans?page=2"),
            GuardDecision::RedirectToLogin {
                next: "/admin/ad-plans?page=2".into()
            }
        );
    }

    #[test]
    fn test_logged_in_renders() {
        assert_eq!(decide(&logged_in(), "/"), GuardDecision::Render);
    }

    #[test]
    fn test_safe_next_rejects_foreign_targets() {
        assert_eq!(safe_next(Some("/ad-groups")), "/ad-groups");
        assert_eq!(safe_next(Some("//evil.example.com")), "/");
        assert_eq!(safe_next(Some("/\\evil.example.com")), "/");
        assert_eq!(safe_next(Some("https://evil.example.com")), "/");
        assert_eq!(safe_next(Some("/login?next=/x")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_login_location_encodes_next() {
        assert_eq!(login_location("/"), "/login");
        assert_eq!(
            login_location("/ad-plans?page=2&name=a b"),
            "/login?next=%2Fad-plans%3Fpage%3D2%26name%3Da%20b"
        );
    }
}

//! Session middleware configuration.
//!
//! The cookie session only carries the persisted console keys (token,
//! profile, selected account) and the console session id, so an in-memory
//! store is enough: a restart logs everyone out.

use std::time::Duration;

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::ConsoleConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "ad_console_session";

/// Idle time after which a session expires (24 hours).
pub const SESSION_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Create the session layer.
#[must_use]
pub fn create_session_layer(config: &ConsoleConfig) -> SessionManagerLayer<MemoryStore> {
    let expiry_seconds = i64::try_from(SESSION_EXPIRY.as_secs()).unwrap_or(i64::MAX);

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(expiry_seconds),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}

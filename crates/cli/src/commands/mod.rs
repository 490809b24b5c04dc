//! Command implementations.
//!
//! Every command opens a [`Context`]: the file-backed session store, the
//! backend client and a session manager restored from the store.

pub mod accounts;
pub mod auth;
pub mod plans;

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use ad_console::api::{ApiClient, ApiError, Backend};
use ad_console::session::{SessionError, SessionManager, SessionState};
use ad_console::storage::FileStorage;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Not logged in. Run `adctl login -u <username>` first.")]
    NotLoggedIn,

    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),

    #[error("No account selected")]
    NoAccount,

    #[error("Failed to read password: {0}")]
    Password(#[from] std::io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
}

/// Everything a command needs.
pub struct Context {
    storage: FileStorage,
    api: ApiClient,
    manager: SessionManager,
}

impl Context {
    /// Open the state file and restore the session from it.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] if the configuration is invalid or the state
    /// file cannot be read.
    pub async fn open(state: PathBuf) -> Result<Self, CliError> {
        dotenvy::dotenv().ok();

        let base_url = std::env::var("API_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let timeout = match std::env::var("API_TIMEOUT_MS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    CliError::InvalidEnvVar("API_TIMEOUT_MS", e.to_string())
                })?,
            Err(_) => DEFAULT_TIMEOUT_MS,
        };

        let ctx = Self {
            storage: FileStorage::new(state),
            api: ApiClient::new(&base_url, Duration::from_millis(timeout))?,
            manager: SessionManager::new(),
        };
        tracing::debug!(state = %ctx.storage.path().display(), "Restoring session");
        ctx.manager.initialize(&ctx.backend()).await?;
        Ok(ctx)
    }

    #[must_use]
    pub fn backend(&self) -> Backend<'_> {
        self.api.backend(&self.storage)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.manager.snapshot()
    }

    /// The session state, failing unless someone is logged in.
    ///
    /// # Errors
    ///
    /// [`CliError::NotLoggedIn`].
    pub fn logged_in(&self) -> Result<SessionState, CliError> {
        let state = self.state();
        if state.is_logged_in() {
            Ok(state)
        } else {
            Err(CliError::NotLoggedIn)
        }
    }

    /// Pass a backend result through, dropping the stored session on 401.
    ///
    /// # Errors
    ///
    /// The API error; unauthorized becomes [`CliError::NotLoggedIn`].
    pub async fn checked<T>(&self, result: Result<T, ApiError>) -> Result<T, CliError> {
        match result {
            Err(ApiError::Unauthorized) => {
                self.manager.force_logout(&self.storage).await?;
                Err(CliError::NotLoggedIn)
            }
            other => Ok(other?),
        }
    }
}

/// Read one line from stdin as the password.
///
/// # Errors
///
/// Returns the I/O error if stdin cannot be read.
#[allow(clippy::print_stderr)]
pub fn read_password() -> Result<String, CliError> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

//! Application state shared across handlers.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::config::ConsoleConfig;
use crate::middleware::SESSION_EXPIRY;
use crate::registry::SessionRegistry;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    config: ConsoleConfig,
    api: ApiClient,
    registry: SessionRegistry,
}

impl AppState {
    /// Build the state from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the backend client cannot be built.
    pub fn new(config: ConsoleConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(config.api_base_url.as_str(), config.api_timeout)?;
        let registry = SessionRegistry::new(SESSION_EXPIRY, config.page_size);
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                registry,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }
}

//! Console configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CONSOLE_BASE_URL` - Public URL of the console (decides secure cookies)
//!
//! ## Optional
//! - `CONSOLE_HOST` - Bind address (default: 127.0.0.1)
//! - `CONSOLE_PORT` - Listen port (default: 3001)
//! - `API_BASE_URL` - Backend REST root (default: <http://localhost:3000/api>)
//! - `API_TIMEOUT_MS` - Backend request timeout (default: 10000)
//! - `CONSOLE_PAGE_SIZE` - Rows per list page (default: 20)
//! - `CONSOLE_TITLE` - Title shown in the header (default: Ad Console)
//! - `CONSOLE_FEATURE_ADMIN` - Enable the `/admin` section (default: true)
//! - `CONSOLE_LOG_JSON` - Emit JSON logs (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//!
//! ## Optional (TLS)
//! - `CONSOLE_TLS_CERT` - PEM-encoded certificate chain
//! - `CONSOLE_TLS_KEY` - PEM-encoded private key

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use ad_console_core::page::MAX_PAGE_SIZE;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_TITLE: &str = "Ad Console";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Console application configuration.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the console
    pub base_url: Url,
    /// Backend REST API root
    pub api_base_url: Url,
    /// Timeout for each backend request
    pub api_timeout: Duration,
    /// Rows per list page
    pub page_size: u32,
    /// Title shown in the page header
    pub title: String,
    /// Whether the `/admin` section is mounted
    pub feature_admin: bool,
    /// JSON log output
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

/// Where variables are read from.
type Source<'a> = &'a dyn Fn(&str) -> Option<String>;

impl TlsConfig {
    fn from_source(env: Source<'_>) -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env(env, "CONSOLE_TLS_CERT"),
            get_optional_env(env, "CONSOLE_TLS_KEY"),
        ) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "CONSOLE_TLS_*".to_string(),
                "Both CONSOLE_TLS_CERT and CONSOLE_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_source(&|key| std::env::var(key).ok())
    }

    fn from_source(env: Source<'_>) -> Result<Self, ConfigError> {
        let host = parse_env(env, "CONSOLE_HOST", "127.0.0.1")?;
        let port = parse_env(env, "CONSOLE_PORT", "3001")?;
        let base_url = parse_url("CONSOLE_BASE_URL", &get_required_env(env, "CONSOLE_BASE_URL")?)?;
        let api_base_url = parse_url(
            "API_BASE_URL",
            &get_env_or_default(env, "API_BASE_URL", DEFAULT_API_BASE_URL),
        )?;
        let api_timeout = Duration::from_millis(parse_env(env, "API_TIMEOUT_MS", "10000")?);

        let page_size: u32 = parse_env(env, "CONSOLE_PAGE_SIZE", "20")?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidEnvVar(
                "CONSOLE_PAGE_SIZE".to_string(),
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }

        let title = get_env_or_default(env, "CONSOLE_TITLE", DEFAULT_TITLE);
        let feature_admin = parse_flag(env, "CONSOLE_FEATURE_ADMIN", true)?;
        let log_json = parse_flag(env, "CONSOLE_LOG_JSON", false)?;

        let sentry_dsn = get_optional_env(env, "SENTRY_DSN");
        let sentry_environment = get_optional_env(env, "SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env(env, "SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env(env, "SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let tls = TlsConfig::from_source(env)?;

        Ok(Self {
            host,
            port,
            base_url,
            api_base_url,
            api_timeout,
            page_size,
            title,
            feature_admin,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies must be marked `Secure`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

fn get_required_env(env: Source<'_>, key: &str) -> Result<String, ConfigError> {
    get_optional_env(env, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(env: Source<'_>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(env: Source<'_>, key: &str, default: &str) -> String {
    get_optional_env(env, key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(env: Source<'_>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(env, key, default)
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_flag(env: Source<'_>, key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = get_optional_env(env, key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http or https URL".to_string(),
        ));
    }
    Ok(url)
}

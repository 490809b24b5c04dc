//! HTTP middleware stack for the console.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with in-memory store)
//! 5. Security headers
//!
//! The route guard is not a layer: protected handlers take the
//! [`RequireSession`] extractor.

pub mod guard;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use guard::{
    GuardDecision, GuardRejection, RequireSession, SessionContext, decide, login_location, safe_next,
};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{SESSION_EXPIRY, create_session_layer};

//! Session and account state.
//!
//! [`SessionState`] is a plain serializable value changed only through
//! [`SessionState::apply`]. [`SessionManager`] owns one and performs the
//! backend calls around each transition.

mod manager;
mod state;

pub use manager::{InitStatus, SessionError, SessionManager};
pub use state::{LOGIN_FAILED_MESSAGE, Phase, SessionAction, SessionState, select_account};

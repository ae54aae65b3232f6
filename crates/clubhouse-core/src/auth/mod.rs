//! Member sign-in and the persisted session.
//!
//! - `SessionStore`: the current user, persisted to `club-session.json`
//! - `AuthService`: login, registration, logout and profile updates

pub mod service;
pub mod session;

pub use service::{AuthError, AuthService};
pub use session::SessionStore;

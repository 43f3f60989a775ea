/// Middleware module
///
/// Custom middleware for authentication, logging, and other concerns.

mod session_auth;

pub use session_auth::{AuthenticatedUser, SessionAuth};

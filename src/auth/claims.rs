/// JWT Claims structure
///
/// Payload of an access token. `exp` and `iat` are standard RFC 7519
/// claims; the rest identify the user and the session refresh id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Always `true` for tokens minted at login
    pub authorized: bool,
    /// User ID as UUID string
    pub user_id: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Refresh identifier, also stored in the session record
    pub refresh_uuid: String,
}

impl Claims {
    /// Create claims for `user_id` expiring `expiry_seconds` from now
    pub fn new(user_id: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            authorized: true,
            user_id: user_id.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            refresh_uuid: Uuid::new_v4().to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// A `user_id` that is not a UUID makes the whole token invalid
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.user_id).map_err(|_| AuthError::TokenInvalid)
    }
}

/// Server-side session binding
///
/// The session cookie carries only an opaque key:
/// - 64 random alphanumeric characters
/// - stored as its SHA-256 hash, never in plaintext
/// - rotated on every login
///
/// All state (authenticated flag, access token, expiry, refresh id) lives
/// in the session store.

use std::sync::Arc;
use std::time::Duration;

use actix_web::cookie::{time, Cookie, SameSite};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::jwt::IssuedToken;
use crate::configuration::SessionSettings;
use crate::error::AppError;
use crate::store::{timed, SessionRecord, SessionStore};

const SESSION_KEY_LENGTH: usize = 64;

/// Plaintext session key, exactly what the client's cookie holds
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn generate() -> Self {
        let key = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_KEY_LENGTH)
            .map(char::from)
            .collect();
        Self(key)
    }

    /// Accepts a cookie value only if it has the shape of a generated key
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() == SESSION_KEY_LENGTH && value.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key; the plaintext never reaches the store
    pub(crate) fn storage_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey([redacted])")
    }
}

/// Read-only snapshot of one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub user_id: Option<Uuid>,
    pub authenticated: bool,
    pub access_token: String,
    pub access_token_expiry: DateTime<Utc>,
    pub refresh_token: String,
}

impl SessionView {
    /// Authenticated and not past its access token expiry
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.authenticated && self.access_token_expiry > now
    }
}

impl From<SessionRecord> for SessionView {
    fn from(record: SessionRecord) -> Self {
        Self {
            user_id: record.user_id,
            authenticated: record.authenticated,
            access_token: record.access_token,
            access_token_expiry: record.access_token_expiry,
            refresh_token: record.refresh_token,
        }
    }
}

#[derive(Clone)]
pub struct SessionBinder {
    store: Arc<dyn SessionStore>,
    timeout: Duration,
    settings: SessionSettings,
}

impl SessionBinder {
    pub fn new(store: Arc<dyn SessionStore>, timeout: Duration, settings: SessionSettings) -> Self {
        Self {
            store,
            timeout,
            settings,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.settings.cookie_name
    }

    /// Binds `issued` to a brand-new session and returns its key.
    ///
    /// Returns only after the store has acknowledged the write; a caller
    /// that gets `Ok` may hand the token to the client.
    ///
    /// # Errors
    /// Returns error if the store fails or times out
    pub async fn login(
        &self,
        previous: Option<&SessionKey>,
        user_id: Uuid,
        issued: &IssuedToken,
    ) -> Result<SessionKey, AppError> {
        if let Some(previous) = previous {
            timed(self.timeout, self.store.delete(&previous.storage_key())).await?;
        }

        let key = SessionKey::generate();
        let record = SessionRecord {
            user_id: Some(user_id),
            authenticated: true,
            access_token: issued.token.clone(),
            access_token_expiry: issued.expires_at,
            refresh_token: issued.refresh_id.clone(),
            created_at: Utc::now(),
        };

        timed(self.timeout, self.store.save(&key.storage_key(), &record)).await?;
        tracing::debug!(user_id = %user_id, "Session bound");

        Ok(key)
    }

    /// Drops the session. Missing or unknown keys are fine.
    ///
    /// # Errors
    /// Returns error if the store fails or times out
    pub async fn logout(&self, key: Option<&SessionKey>) -> Result<(), AppError> {
        if let Some(key) = key {
            timed(self.timeout, self.store.delete(&key.storage_key())).await?;
        }
        Ok(())
    }

    pub async fn current(&self, key: &SessionKey) -> Result<Option<SessionView>, AppError> {
        let record = timed(self.timeout, self.store.load(&key.storage_key())).await?;
        Ok(record.map(SessionView::from))
    }

    /// Deletes every session whose access token has expired and returns
    /// how many went. Such sessions already fail `is_active`.
    ///
    /// # Errors
    /// Returns error if the store fails or times out
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let purged = timed(self.timeout, self.store.delete_expired(Utc::now())).await?;
        Ok(purged)
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.settings.cleanup_interval()
    }

    /// `HttpOnly` cookie carrying `key`, living as long as the access token
    pub fn cookie(&self, key: &SessionKey, expires_at: DateTime<Utc>) -> Cookie<'static> {
        let max_age = (expires_at - Utc::now()).num_seconds().max(0);
        Cookie::build(self.settings.cookie_name.clone(), key.as_str().to_string())
            .path("/")
            .http_only(true)
            .secure(self.settings.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(max_age))
            .finish()
    }

    /// Cookie that tells the browser to forget the session key
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.settings.cookie_name.clone(), "")
            .path("/")
            .http_only(true)
            .secure(self.settings.cookie_secure)
            .same_site(SameSite::Lax)
            .finish();
        cookie.make_removal();
        cookie
    }
}

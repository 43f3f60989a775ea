/// JWT Token Generation and Validation
///
/// One `TokenIssuer` per process, built from `JwtSettings`. Only the HMAC
/// family is accepted on the way in; `none` and asymmetric algorithms are
/// rejected before the signature is even looked at.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::models::User;

const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// A freshly minted access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, badly signed, wrong algorithm or wrong issuer
    Invalid,
    Expired,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::TokenInvalid,
            TokenError::Expired => AuthError::TokenExpired,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Auth(err.into())
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
    issuer: String,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl_seconds: config.access_token_expiry,
            issuer: config.issuer.clone(),
        }
    }

    /// Mint an access token for `user`
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue(&self, user: &User) -> Result<IssuedToken, AppError> {
        self.issue_for(user.id)
    }

    pub fn issue_for(&self, user_id: Uuid) -> Result<IssuedToken, AppError> {
        let claims = Claims::new(user_id, self.ttl_seconds, self.issuer.clone());

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?;

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at,
            refresh_id: claims.refresh_uuid,
        })
    }

    /// Validate a token and return its claims
    ///
    /// # Errors
    /// `TokenError::Expired` once `exp` has passed (no leeway),
    /// `TokenError::Invalid` for anything else that is wrong with it
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!("JWT validation error: {}", e);
                    TokenError::Invalid
                }
            })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation
    }
}

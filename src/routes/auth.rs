/// Authentication Routes
///
/// Login binds a fresh access token to a fresh server-side session;
/// logout drops the session, which revokes the token with it.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{PasswordHasher, SessionBinder, SessionKey, TokenIssuer};
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext, ValidationError};
use crate::routes::MessageResponse;
use crate::store::{timed, Stores};
use crate::validators::is_valid_email;

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
}

/// POST /login
///
/// Authenticate with email and password.
/// Returns the access token and sets the session cookie it is bound to.
///
/// # Errors
/// - 400: Malformed body or empty fields
/// - 401: Unknown email or wrong password (same body for both)
/// - 500: Store failure or timeout
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    stores: web::Data<Stores>,
    hasher: web::Data<PasswordHasher>,
    issuer: web::Data<TokenIssuer>,
    binder: web::Data<SessionBinder>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let email = is_valid_email(&form.email)?;
    if form.password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }

    let user = match timed(stores.timeout, stores.users.find_by_email(&email)).await {
        Ok(user) => Some(user),
        Err(DatabaseError::NotFound(_)) => None,
        Err(e) => return Err(context.record(e.into())),
    };

    let user = match user {
        Some(user) if hasher.verify(&form.password, &user.password_hash) => user,
        Some(user) => {
            tracing::info!(request_id = %context.request_id, user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        None => {
            // Same bcrypt cost as a real mismatch
            hasher.verify_decoy(&form.password);
            tracing::info!(request_id = %context.request_id, "Login failed: unknown email");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let context = context.with_user_id(user.id);
    let issued = issuer.issue(&user).map_err(|e| context.record(e))?;

    let previous = req
        .cookie(binder.cookie_name())
        .and_then(|cookie| SessionKey::parse(cookie.value()));
    let key = binder
        .login(previous.as_ref(), user.id, &issued)
        .await
        .map_err(|e| context.record(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok()
        .cookie(binder.cookie(&key, issued.expires_at))
        .json(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            refresh_token: issued.refresh_id,
        }))
}

/// POST /logout
///
/// Always succeeds unless the store fails; a missing or unknown session
/// is not an error.
pub async fn logout(
    req: HttpRequest,
    binder: web::Data<SessionBinder>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout");

    let key = req
        .cookie(binder.cookie_name())
        .and_then(|cookie| SessionKey::parse(cookie.value()));
    binder
        .logout(key.as_ref())
        .await
        .map_err(|e| context.record(e))?;

    tracing::info!(
        request_id = %context.request_id,
        had_session = key.is_some(),
        "User logged out"
    );

    Ok(HttpResponse::Ok()
        .cookie(binder.removal_cookie())
        .json(MessageResponse::new("Logout successful")))
}

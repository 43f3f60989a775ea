/// User Routes
///
/// Registration is public; everything else runs behind the session auth
/// middleware and reads the caller from `AuthenticatedUser`.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::PasswordHasher;
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::models::{User, UserUpdate};
use crate::routes::parse_id;
use crate::store::{timed, Stores};
use crate::validators::{is_valid_email, is_valid_name, is_valid_password};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub location: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub location: Option<String>,
    pub password: Option<String>,
}

/// POST /user
///
/// # Errors
/// - 400: Invalid names, email, location or weak password
/// - 409: Email already registered
pub async fn create_user(
    form: web::Json<CreateUserRequest>,
    stores: web::Data<Stores>,
    hasher: web::Data<PasswordHasher>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let first_name = is_valid_name("first_name", &form.first_name)?;
    let last_name = is_valid_name("last_name", &form.last_name)?;
    let email = is_valid_email(&form.email)?;
    let location = is_valid_name("location", &form.location)?;
    is_valid_password(&form.password)?;

    let password_hash = hasher.hash(&form.password)?;
    let user = User::new(first_name, last_name, email, password_hash, location);

    timed(stores.timeout, stores.users.insert(&user))
        .await
        .map_err(|e| context.record(e.into()))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(user.to_public()))
}

/// GET /user/current
pub async fn get_current_user(
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let user = timed(stores.timeout, stores.users.find_by_id(caller.user_id)).await?;
    Ok(HttpResponse::Ok().json(user.to_public()))
}

/// GET /user/{id}
pub async fn get_user(
    path: web::Path<String>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    let user = timed(stores.timeout, stores.users.find_by_id(id)).await?;
    Ok(HttpResponse::Ok().json(user.to_public()))
}

/// PUT /user/{id}
///
/// Users may only change their own profile.
///
/// # Errors
/// - 400: Malformed id, invalid field, weak password or nothing to update
/// - 403: `id` is not the caller
pub async fn update_user(
    path: web::Path<String>,
    form: web::Json<UpdateUserRequest>,
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
    hasher: web::Data<PasswordHasher>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_update").with_user_id(caller.user_id);

    let id = parse_id(&path)?;
    if id != caller.user_id {
        return Err(context.record(AuthError::Forbidden.into()));
    }

    let form = form.into_inner();
    let mut update = UserUpdate {
        first_name: form
            .first_name
            .map(|v| is_valid_name("first_name", &v))
            .transpose()?,
        last_name: form
            .last_name
            .map(|v| is_valid_name("last_name", &v))
            .transpose()?,
        location: form
            .location
            .map(|v| is_valid_name("location", &v))
            .transpose()?,
        ..UserUpdate::default()
    };
    if let Some(password) = form.password {
        is_valid_password(&password)?;
        update.password_hash = Some(hasher.hash(&password)?);
    }

    if update.is_empty() {
        return Err(ValidationError::Constraint("no fields to update".to_string()).into());
    }

    let user = timed(stores.timeout, stores.users.update_fields(id, &update))
        .await
        .map_err(|e| context.record(e.into()))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        password_changed = update.password_hash.is_some(),
        "User updated"
    );

    Ok(HttpResponse::Ok().json(user.to_public()))
}

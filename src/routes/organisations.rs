/// Organisation Routes
///
/// A user belongs to at most one organisation. Only members can see or
/// change it; for everyone else it does not exist.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError, ErrorContext, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::models::{Organisation, OrganisationUpdate, UserUpdate};
use crate::routes::{parse_id, MessageResponse};
use crate::store::{timed, Stores};
use crate::validators::{is_valid_currency, is_valid_name};

#[derive(Deserialize)]
pub struct CreateOrganisationRequest {
    pub name: String,
    pub currency: String,
}

#[derive(Deserialize)]
pub struct UpdateOrganisationRequest {
    pub name: Option<String>,
    pub currency: Option<String>,
}

/// POST /organisation
///
/// Creates the organisation and makes the caller its first member.
///
/// # Errors
/// - 400: Invalid name/currency, or the caller already has an organisation
pub async fn create_organisation(
    form: web::Json<CreateOrganisationRequest>,
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("organisation_creation").with_user_id(caller.user_id);

    let name = is_valid_name("name", &form.name)?;
    let currency = is_valid_currency(&form.currency)?;

    let user = timed(stores.timeout, stores.users.find_by_id(caller.user_id)).await?;
    if user.organisation_id.is_some() {
        return Err(context.record(
            ValidationError::Constraint("user already belongs to an organisation".to_string())
                .into(),
        ));
    }

    let organisation = open_organisation(&stores, user.id, name, currency)
        .await
        .map_err(|e| context.record(e))?;

    tracing::info!(
        request_id = %context.request_id,
        organisation_id = %organisation.id,
        user_id = %user.id,
        "Organisation created"
    );

    Ok(HttpResponse::Created().json(organisation))
}

/// GET /organisation/{id}
pub async fn get_organisation(
    path: web::Path<String>,
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    ensure_member(&stores, caller.user_id, id).await?;

    let organisation = timed(stores.timeout, stores.organisations.find_by_id(id)).await?;
    Ok(HttpResponse::Ok().json(organisation))
}

/// PUT /organisation/{id}
///
/// # Errors
/// - 400: Malformed id, invalid field or nothing to update
/// - 404: Unknown organisation or caller is not a member
pub async fn update_organisation(
    path: web::Path<String>,
    form: web::Json<UpdateOrganisationRequest>,
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("organisation_update").with_user_id(caller.user_id);

    let id = parse_id(&path)?;
    ensure_member(&stores, caller.user_id, id).await?;

    let update = OrganisationUpdate {
        name: form.name.as_deref().map(|v| is_valid_name("name", v)).transpose()?,
        currency: form.currency.as_deref().map(is_valid_currency).transpose()?,
    };
    if update.name.is_none() && update.currency.is_none() {
        return Err(ValidationError::Constraint("no fields to update".to_string()).into());
    }

    let organisation = timed(stores.timeout, stores.organisations.update(id, &update))
        .await
        .map_err(|e| context.record(e.into()))?;

    tracing::info!(
        request_id = %context.request_id,
        organisation_id = %organisation.id,
        "Organisation updated"
    );

    Ok(HttpResponse::Ok().json(organisation))
}

/// DELETE /organisation/{id}
///
/// Deletes the organisation with all of its items. Members stay
/// registered and may create or join another organisation afterwards.
///
/// # Errors
/// - 400: Malformed id
/// - 404: Unknown organisation or caller is not a member
pub async fn delete_organisation(
    path: web::Path<String>,
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("organisation_deletion").with_user_id(caller.user_id);

    let id = parse_id(&path)?;
    ensure_member(&stores, caller.user_id, id).await?;

    // Children first: items and members reference the organisation
    let items = timed(stores.timeout, stores.items.delete_by_organisation(id))
        .await
        .map_err(|e| context.record(e.into()))?;
    let members = timed(stores.timeout, stores.users.clear_organisation(id))
        .await
        .map_err(|e| context.record(e.into()))?;
    timed(stores.timeout, stores.organisations.delete(id))
        .await
        .map_err(|e| context.record(e.into()))?;

    tracing::info!(
        request_id = %context.request_id,
        organisation_id = %id,
        items,
        members,
        "Organisation deleted"
    );

    Ok(HttpResponse::Ok().json(MessageResponse::new("Organisation deleted")))
}

/// Inserts the organisation and makes `user_id` a member. If the
/// membership write fails the organisation is removed again.
async fn open_organisation(
    stores: &Stores,
    user_id: Uuid,
    name: String,
    currency: String,
) -> Result<Organisation, AppError> {
    let organisation = Organisation::new(name, currency);
    timed(stores.timeout, stores.organisations.insert(&organisation)).await?;

    let membership = UserUpdate {
        organisation_id: Some(organisation.id),
        ..UserUpdate::default()
    };
    if let Err(e) = timed(stores.timeout, stores.users.update_fields(user_id, &membership)).await {
        match timed(stores.timeout, stores.organisations.delete(organisation.id)).await {
            Ok(()) => tracing::warn!(
                organisation_id = %organisation.id,
                "Membership write failed; organisation removed"
            ),
            Err(cleanup) => tracing::error!(
                organisation_id = %organisation.id,
                error = %cleanup,
                "Membership write failed and the organisation could not be removed"
            ),
        }
        return Err(e.into());
    }

    Ok(organisation)
}

/// Non-members get the same 404 as for a missing organisation
async fn ensure_member(
    stores: &Stores,
    user_id: Uuid,
    organisation_id: Uuid,
) -> Result<(), AppError> {
    let user = timed(stores.timeout, stores.users.find_by_id(user_id)).await?;
    if user.organisation_id != Some(organisation_id) {
        return Err(DatabaseError::NotFound("organisation".to_string()).into());
    }
    Ok(())
}

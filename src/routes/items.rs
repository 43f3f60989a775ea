/// Item Routes
///
/// Every item belongs to the caller's organisation. Items of other
/// organisations answer 404, exactly like missing ones.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError, ErrorContext, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::models::{Item, ItemUpdate, Organisation, Price};
use crate::routes::parse_id;
use crate::store::{timed, Stores};
use crate::validators::{is_valid_amount, is_valid_description, is_valid_name, is_valid_quantity};

#[derive(Deserialize)]
pub struct PriceRequest {
    pub amount: f64,
}

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: PriceRequest,
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<PriceRequest>,
    pub quantity: Option<i32>,
}

/// POST /item
///
/// The price currency is taken from the organisation.
///
/// # Errors
/// - 400: Invalid field, or the caller has no organisation
/// - 409: The organisation already has an item with this name
pub async fn create_item(
    form: web::Json<CreateItemRequest>,
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("item_creation").with_user_id(caller.user_id);

    let name = is_valid_name("name", &form.name)?;
    let description = is_valid_description(&form.description)?;
    let amount = is_valid_amount(form.price.amount)?;
    let quantity = is_valid_quantity(form.quantity)?;

    let organisation = caller_organisation(&stores, caller.user_id).await?;
    let item = Item::new(
        organisation.id,
        name,
        description,
        Price {
            amount,
            currency: organisation.currency,
        },
        quantity,
    );

    timed(stores.timeout, stores.items.insert(&item))
        .await
        .map_err(|e| context.record(e.into()))?;

    tracing::info!(
        request_id = %context.request_id,
        item_id = %item.id,
        organisation_id = %item.organisation_id,
        "Item created"
    );

    Ok(HttpResponse::Created().json(item))
}

/// GET /item/{id}
pub async fn get_item(
    path: web::Path<String>,
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    let organisation = caller_organisation(&stores, caller.user_id).await?;
    let item = owned_item(&stores, id, organisation.id).await?;
    Ok(HttpResponse::Ok().json(item))
}

/// GET /items
pub async fn list_items(
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let organisation = caller_organisation(&stores, caller.user_id).await?;
    let items = timed(
        stores.timeout,
        stores.items.list_by_organisation(organisation.id),
    )
    .await?;
    Ok(HttpResponse::Ok().json(items))
}

/// PUT /item/{id}
///
/// # Errors
/// - 400: Malformed id, invalid field or nothing to update
/// - 404: Unknown item or item of another organisation
/// - 409: Renaming onto an existing item name
pub async fn update_item(
    path: web::Path<String>,
    form: web::Json<UpdateItemRequest>,
    caller: web::ReqData<AuthenticatedUser>,
    stores: web::Data<Stores>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("item_update").with_user_id(caller.user_id);

    let id = parse_id(&path)?;
    let update = ItemUpdate {
        name: form.name.as_deref().map(|v| is_valid_name("name", v)).transpose()?,
        description: form.description.as_deref().map(is_valid_description).transpose()?,
        amount: form.price.as_ref().map(|p| is_valid_amount(p.amount)).transpose()?,
        quantity: form.quantity.map(is_valid_quantity).transpose()?,
    };
    if update.name.is_none()
        && update.description.is_none()
        && update.amount.is_none()
        && update.quantity.is_none()
    {
        return Err(ValidationError::Constraint("no fields to update".to_string()).into());
    }

    let organisation = caller_organisation(&stores, caller.user_id).await?;
    owned_item(&stores, id, organisation.id).await?;

    let item = timed(stores.timeout, stores.items.update(id, &update))
        .await
        .map_err(|e| context.record(e.into()))?;

    tracing::info!(request_id = %context.request_id, item_id = %item.id, "Item updated");

    Ok(HttpResponse::Ok().json(item))
}

async fn caller_organisation(stores: &Stores, user_id: Uuid) -> Result<Organisation, AppError> {
    let user = timed(stores.timeout, stores.users.find_by_id(user_id)).await?;
    let organisation_id = user.organisation_id.ok_or_else(|| {
        ValidationError::Constraint("user does not belong to an organisation".to_string())
    })?;
    Ok(timed(stores.timeout, stores.organisations.find_by_id(organisation_id)).await?)
}

async fn owned_item(stores: &Stores, id: Uuid, organisation_id: Uuid) -> Result<Item, AppError> {
    let item = timed(stores.timeout, stores.items.find_by_id(id)).await?;
    if item.organisation_id != organisation_id {
        return Err(DatabaseError::NotFound("item".to_string()).into());
    }
    Ok(item)
}

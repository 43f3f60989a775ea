mod auth;
mod health_check;
mod items;
mod organisations;
mod users;

pub use auth::{login, logout};
pub use health_check::health_check;
pub use items::{create_item, get_item, list_items, update_item};
pub use organisations::{
    create_organisation, delete_organisation, get_organisation, update_organisation,
};
pub use users::{create_user, get_current_user, get_user, update_user};

use serde::Serialize;
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Path ids must be UUIDs; anything else is a 400, not a 404
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidFormat("id".to_string()))
}

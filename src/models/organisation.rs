use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant. Users and items point at it by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organisation {
    pub id: Uuid,
    pub name: String,
    /// ISO 4217 alpha code used for every item price in this organisation
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Organisation {
    pub fn new(name: String, currency: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            currency,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrganisationUpdate {
    pub name: Option<String>,
    pub currency: Option<String>,
}

impl OrganisationUpdate {
    pub fn apply(&self, organisation: &mut Organisation) {
        if let Some(name) = &self.name {
            organisation.name = name.clone();
        }
        if let Some(currency) = &self.currency {
            organisation.currency = currency.clone();
        }
    }
}

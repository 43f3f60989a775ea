/// Persistence layer
///
/// Handlers and the auth core only see these traits. Two backends exist:
/// Postgres through sqlx, and an in-process map used by tests and local
/// runs. Every call site goes through [`timed`] so a stalled backend turns
/// into a 500 instead of a hung request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::models::{Item, ItemUpdate, Organisation, OrganisationUpdate, User, UserUpdate};

mod memory;
mod postgres;

pub use memory::{MemoryItemStore, MemoryOrganisationStore, MemorySessionStore, MemoryUserStore};
pub use postgres::{PgItemStore, PgOrganisationStore, PgSessionStore, PgUserStore};

/// Identity collection
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `email` must already be normalized (trimmed, lowercased)
    async fn find_by_email(&self, email: &str) -> Result<User, DatabaseError>;
    async fn find_by_id(&self, id: Uuid) -> Result<User, DatabaseError>;
    /// Fails with `UniqueConstraintViolation` when the email is taken
    async fn insert(&self, user: &User) -> Result<(), DatabaseError>;
    async fn update_fields(&self, id: Uuid, update: &UserUpdate) -> Result<User, DatabaseError>;
    /// Detaches every member of `organisation_id`; returns how many
    async fn clear_organisation(&self, organisation_id: Uuid) -> Result<u64, DatabaseError>;
}

/// Server-side session state, keyed by the SHA-256 hash of the cookie value
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// `None` only for records that were never bound to an identity
    pub user_id: Option<Uuid>,
    pub authenticated: bool,
    pub access_token: String,
    pub access_token_expiry: DateTime<Utc>,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace; returns only once the record is durable
    async fn save(&self, key_hash: &str, record: &SessionRecord) -> Result<(), DatabaseError>;
    async fn load(&self, key_hash: &str) -> Result<Option<SessionRecord>, DatabaseError>;
    /// Deleting a missing key is not an error
    async fn delete(&self, key_hash: &str) -> Result<(), DatabaseError>;
    /// Drops every record whose access token expired at or before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError>;
}

#[async_trait]
pub trait OrganisationStore: Send + Sync {
    async fn insert(&self, organisation: &Organisation) -> Result<(), DatabaseError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Organisation, DatabaseError>;
    async fn update(
        &self,
        id: Uuid,
        update: &OrganisationUpdate,
    ) -> Result<Organisation, DatabaseError>;
    /// Fails with `NotFound` when no such organisation exists. Members and
    /// items must be detached first.
    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fails with `UniqueConstraintViolation` when the organisation already
    /// has an item with the same name
    async fn insert(&self, item: &Item) -> Result<(), DatabaseError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Item, DatabaseError>;
    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Item>, DatabaseError>;
    async fn update(&self, id: Uuid, update: &ItemUpdate) -> Result<Item, DatabaseError>;
    async fn delete_by_organisation(&self, organisation_id: Uuid) -> Result<u64, DatabaseError>;
}

/// The set of stores the application is wired with
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub organisations: Arc<dyn OrganisationStore>,
    pub items: Arc<dyn ItemStore>,
    /// Budget for one store round-trip
    pub timeout: Duration,
}

impl Stores {
    pub fn in_memory(timeout: Duration) -> Self {
        Self {
            users: Arc::new(MemoryUserStore::default()),
            sessions: Arc::new(MemorySessionStore::default()),
            organisations: Arc::new(MemoryOrganisationStore::default()),
            items: Arc::new(MemoryItemStore::default()),
            timeout,
        }
    }

    pub fn postgres(pool: PgPool, timeout: Duration) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool.clone())),
            organisations: Arc::new(PgOrganisationStore::new(pool.clone())),
            items: Arc::new(PgItemStore::new(pool)),
            timeout,
        }
    }
}

/// Runs one store call under `limit`
pub async fn timed<T, F>(limit: Duration, call: F) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(timeout_secs = limit.as_secs(), "Store call timed out");
            Err(DatabaseError::Timeout(limit.as_secs()))
        }
    }
}

/// Postgres-backed stores. Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ItemStore, OrganisationStore, SessionRecord, SessionStore, UserStore};
use crate::error::DatabaseError;
use crate::models::{
    Item, ItemUpdate, Organisation, OrganisationUpdate, Price, Role, User, UserUpdate,
};

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, location, role, \
                            organisation_id, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, organisation_id, name, description, price_amount, \
                            price_currency, quantity, created_at, updated_at";

/// Replaces the generic constraint name with a client-readable message
fn unique_as(message: &str) -> impl Fn(sqlx::Error) -> DatabaseError + '_ {
    move |err| match DatabaseError::from(err) {
        DatabaseError::UniqueConstraintViolation(_) => {
            DatabaseError::UniqueConstraintViolation(message.to_string())
        }
        other => other,
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    location: String,
    role: String,
    organisation_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| {
            DatabaseError::UnexpectedError(format!("unknown role '{}' for user {}", row.role, row.id))
        })?;
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            location: row.location,
            role,
            organisation_id: row.organisation_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<User, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("user".to_string()))?;
        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("user".to_string()))?;
        row.try_into()
    }

    async fn insert(&self, user: &User) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, location, role,
                               organisation_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.location)
        .bind(user.role.as_str())
        .bind(user.organisation_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unique_as("email already registered"))?;

        Ok(())
    }

    async fn update_fields(&self, id: Uuid, update: &UserUpdate) -> Result<User, DatabaseError> {
        let query = format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                location = COALESCE($4, location),
                password_hash = COALESCE($5, password_hash),
                organisation_id = COALESCE($6, organisation_id),
                updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .bind(update.first_name.as_deref())
            .bind(update.last_name.as_deref())
            .bind(update.location.as_deref())
            .bind(update.password_hash.as_deref())
            .bind(update.organisation_id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("user".to_string()))?;
        row.try_into()
    }

    async fn clear_organisation(&self, organisation_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET organisation_id = NULL, updated_at = $2 WHERE organisation_id = $1",
        )
        .bind(organisation_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save(&self, key_hash: &str, record: &SessionRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (key_hash, user_id, authenticated, access_token,
                                  access_token_expiry, refresh_token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (key_hash) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                authenticated = EXCLUDED.authenticated,
                access_token = EXCLUDED.access_token,
                access_token_expiry = EXCLUDED.access_token_expiry,
                refresh_token = EXCLUDED.refresh_token
            "#,
        )
        .bind(key_hash)
        .bind(record.user_id)
        .bind(record.authenticated)
        .bind(&record.access_token)
        .bind(record.access_token_expiry)
        .bind(&record.refresh_token)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, key_hash: &str) -> Result<Option<SessionRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, (Option<Uuid>, bool, String, DateTime<Utc>, String, DateTime<Utc>)>(
            r#"
            SELECT user_id, authenticated, access_token, access_token_expiry, refresh_token, created_at
            FROM sessions
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(user_id, authenticated, access_token, access_token_expiry, refresh_token, created_at)| {
                SessionRecord {
                    user_id,
                    authenticated,
                    access_token,
                    access_token_expiry,
                    refresh_token,
                    created_at,
                }
            },
        ))
    }

    async fn delete(&self, key_hash: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM sessions WHERE key_hash = $1")
            .bind(key_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE access_token_expiry <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct PgOrganisationStore {
    pool: PgPool,
}

impl PgOrganisationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganisationStore for PgOrganisationStore {
    async fn insert(&self, organisation: &Organisation) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO organisations (id, name, currency, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(organisation.id)
        .bind(&organisation.name)
        .bind(&organisation.currency)
        .bind(organisation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Organisation, DatabaseError> {
        let (id, name, currency, created_at) =
            sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>)>(
                "SELECT id, name, currency, created_at FROM organisations WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("organisation".to_string()))?;

        Ok(Organisation { id, name, currency, created_at })
    }

    async fn update(
        &self,
        id: Uuid,
        update: &OrganisationUpdate,
    ) -> Result<Organisation, DatabaseError> {
        let (id, name, currency, created_at) =
            sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>)>(
                r#"
                UPDATE organisations
                SET name = COALESCE($2, name), currency = COALESCE($3, currency)
                WHERE id = $1
                RETURNING id, name, currency, created_at
                "#,
            )
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.currency.as_deref())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("organisation".to_string()))?;

        Ok(Organisation { id, name, currency, created_at })
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM organisations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("organisation".to_string()));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    organisation_id: Uuid,
    name: String,
    description: String,
    price_amount: f64,
    price_currency: String,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            organisation_id: row.organisation_id,
            name: row.name,
            description: row.description,
            price: Price {
                amount: row.price_amount,
                currency: row.price_currency,
            },
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn insert(&self, item: &Item) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO items (id, organisation_id, name, description, price_amount,
                               price_currency, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id)
        .bind(item.organisation_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price.amount)
        .bind(&item.price.currency)
        .bind(item.quantity)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unique_as("item name already exists"))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Item, DatabaseError> {
        let query = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        sqlx::query_as::<_, ItemRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Item::from)
            .ok_or_else(|| DatabaseError::NotFound("item".to_string()))
    }

    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Item>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM items WHERE organisation_id = $1 ORDER BY created_at",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&query)
            .bind(organisation_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn update(&self, id: Uuid, update: &ItemUpdate) -> Result<Item, DatabaseError> {
        let query = format!(
            r#"
            UPDATE items
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_amount = COALESCE($4, price_amount),
                quantity = COALESCE($5, quantity),
                updated_at = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        sqlx::query_as::<_, ItemRow>(&query)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.description.as_deref())
            .bind(update.amount)
            .bind(update.quantity)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(unique_as("item name already exists"))?
            .map(Item::from)
            .ok_or_else(|| DatabaseError::NotFound("item".to_string()))
    }
    async fn delete_by_organisation(&self, organisation_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM items WHERE organisation_id = $1")
            .bind(organisation_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

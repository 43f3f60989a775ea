/// In-process stores
///
/// Each map sits behind a `std::sync::Mutex`. Locks are taken and released
/// inside a single method body and never held across an await.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ItemStore, OrganisationStore, SessionRecord, SessionStore, UserStore};
use crate::error::DatabaseError;
use crate::models::{Item, ItemUpdate, Organisation, OrganisationUpdate, User, UserUpdate};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, DatabaseError> {
    mutex
        .lock()
        .map_err(|_| DatabaseError::UnexpectedError("store lock poisoned".to_string()))
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<User, DatabaseError> {
        lock(&self.users)?
            .values()
            .find(|user| user.email == email)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound("user".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, DatabaseError> {
        lock(&self.users)?
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound("user".to_string()))
    }

    async fn insert(&self, user: &User) -> Result<(), DatabaseError> {
        let mut users = lock(&self.users)?;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "email already registered".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_fields(&self, id: Uuid, update: &UserUpdate) -> Result<User, DatabaseError> {
        let mut users = lock(&self.users)?;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("user".to_string()))?;
        update.apply(user);
        Ok(user.clone())
    }

    async fn clear_organisation(&self, organisation_id: Uuid) -> Result<u64, DatabaseError> {
        let mut cleared = 0;
        for user in lock(&self.users)?.values_mut() {
            if user.organisation_id == Some(organisation_id) {
                user.organisation_id = None;
                user.updated_at = Utc::now();
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, key_hash: &str, record: &SessionRecord) -> Result<(), DatabaseError> {
        lock(&self.sessions)?.insert(key_hash.to_string(), record.clone());
        Ok(())
    }

    async fn load(&self, key_hash: &str) -> Result<Option<SessionRecord>, DatabaseError> {
        Ok(lock(&self.sessions)?.get(key_hash).cloned())
    }

    async fn delete(&self, key_hash: &str) -> Result<(), DatabaseError> {
        lock(&self.sessions)?.remove(key_hash);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let mut sessions = lock(&self.sessions)?;
        let before = sessions.len();
        sessions.retain(|_, record| record.access_token_expiry > now);
        Ok((before - sessions.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryOrganisationStore {
    organisations: Mutex<HashMap<Uuid, Organisation>>,
}

#[async_trait]
impl OrganisationStore for MemoryOrganisationStore {
    async fn insert(&self, organisation: &Organisation) -> Result<(), DatabaseError> {
        lock(&self.organisations)?.insert(organisation.id, organisation.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Organisation, DatabaseError> {
        lock(&self.organisations)?
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound("organisation".to_string()))
    }

    async fn update(
        &self,
        id: Uuid,
        update: &OrganisationUpdate,
    ) -> Result<Organisation, DatabaseError> {
        let mut organisations = lock(&self.organisations)?;
        let organisation = organisations
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("organisation".to_string()))?;
        update.apply(organisation);
        Ok(organisation.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        lock(&self.organisations)?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound("organisation".to_string()))
    }
}

#[derive(Default)]
pub struct MemoryItemStore {
    items: Mutex<HashMap<Uuid, Item>>,
}

fn name_taken(items: &HashMap<Uuid, Item>, organisation_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
    items.values().any(|item| {
        item.organisation_id == organisation_id && item.name == name && Some(item.id) != except
    })
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn insert(&self, item: &Item) -> Result<(), DatabaseError> {
        let mut items = lock(&self.items)?;
        if name_taken(&items, item.organisation_id, &item.name, None) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "item name already exists".to_string(),
            ));
        }
        items.insert(item.id, item.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Item, DatabaseError> {
        lock(&self.items)?
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound("item".to_string()))
    }

    async fn list_by_organisation(&self, organisation_id: Uuid) -> Result<Vec<Item>, DatabaseError> {
        let mut items: Vec<Item> = lock(&self.items)?
            .values()
            .filter(|item| item.organisation_id == organisation_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn update(&self, id: Uuid, update: &ItemUpdate) -> Result<Item, DatabaseError> {
        let mut items = lock(&self.items)?;
        let organisation_id = items
            .get(&id)
            .map(|item| item.organisation_id)
            .ok_or_else(|| DatabaseError::NotFound("item".to_string()))?;
        if let Some(name) = &update.name {
            if name_taken(&items, organisation_id, name, Some(id)) {
                return Err(DatabaseError::UniqueConstraintViolation(
                    "item name already exists".to_string(),
                ));
            }
        }
        let item = items
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("item".to_string()))?;
        update.apply(item);
        Ok(item.clone())
    }

    async fn delete_by_organisation(&self, organisation_id: Uuid) -> Result<u64, DatabaseError> {
        let mut items = lock(&self.items)?;
        let before = items.len();
        items.retain(|_, item| item.organisation_id != organisation_id);
        Ok((before - items.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;

    fn user(email: &str) -> User {
        User::new(
            "Test".to_string(),
            "User".to_string(),
            email.to_string(),
            "hash".to_string(),
            "Nowhere".to_string(),
        )
    }

    #[tokio::test]
    async fn test_user_lookup_by_email_and_id() {
        let store = MemoryUserStore::default();
        let alice = user("alice@example.com");
        store.insert(&alice).await.unwrap();

        assert_eq!(store.find_by_email("alice@example.com").await.unwrap().id, alice.id);
        assert_eq!(store.find_by_id(alice.id).await.unwrap().email, alice.email);
        assert!(matches!(
            store.find_by_email("bob@example.com").await,
            Err(DatabaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryUserStore::default();
        store.insert(&user("alice@example.com")).await.unwrap();

        let result = store.insert(&user("alice@example.com")).await;
        assert!(matches!(result, Err(DatabaseError::UniqueConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_update_fields_on_missing_user() {
        let store = MemoryUserStore::default();
        let result = store
            .update_fields(Uuid::new_v4(), &UserUpdate::default())
            .await;
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_session_save_load_delete() {
        let store = MemorySessionStore::default();
        let record = SessionRecord {
            user_id: Some(Uuid::new_v4()),
            authenticated: true,
            access_token: "token".to_string(),
            access_token_expiry: Utc::now(),
            refresh_token: "refresh".to_string(),
            created_at: Utc::now(),
        };

        store.save("k", &record).await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(record));

        store.delete("k").await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), None);
        // second delete is a no-op
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_sessions() {
        let store = MemorySessionStore::default();
        let now = Utc::now();
        let record = |expiry| SessionRecord {
            user_id: Some(Uuid::new_v4()),
            authenticated: true,
            access_token: "token".to_string(),
            access_token_expiry: expiry,
            refresh_token: "refresh".to_string(),
            created_at: now,
        };

        store.save("stale", &record(now - chrono::Duration::seconds(1))).await.unwrap();
        store.save("edge", &record(now)).await.unwrap();
        store.save("live", &record(now + chrono::Duration::hours(1))).await.unwrap();

        assert_eq!(store.delete_expired(now).await.unwrap(), 2);
        assert_eq!(store.load("stale").await.unwrap(), None);
        assert_eq!(store.load("edge").await.unwrap(), None);
        assert!(store.load("live").await.unwrap().is_some());
        assert_eq!(store.delete_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_organisation_detaches_only_its_members() {
        let store = MemoryUserStore::default();
        let org = Uuid::new_v4();
        let mut member = user("member@example.com");
        member.organisation_id = Some(org);
        let mut outsider = user("outsider@example.com");
        outsider.organisation_id = Some(Uuid::new_v4());
        store.insert(&member).await.unwrap();
        store.insert(&outsider).await.unwrap();

        assert_eq!(store.clear_organisation(org).await.unwrap(), 1);
        assert_eq!(store.find_by_id(member.id).await.unwrap().organisation_id, None);
        assert_eq!(
            store.find_by_id(outsider.id).await.unwrap().organisation_id,
            outsider.organisation_id
        );
    }

    #[tokio::test]
    async fn test_organisation_delete() {
        let store = MemoryOrganisationStore::default();
        let org = Organisation::new("Garage".to_string(), "EUR".to_string());
        store.insert(&org).await.unwrap();

        store.delete(org.id).await.unwrap();
        assert!(matches!(store.find_by_id(org.id).await, Err(DatabaseError::NotFound(_))));
        assert!(matches!(store.delete(org.id).await, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_item_names_unique_per_organisation() {
        let store = MemoryItemStore::default();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let price = Price { amount: 9.5, currency: "EUR".to_string() };

        let first = Item::new(org_a, "Oil".into(), "5W30".into(), price.clone(), 3);
        store.insert(&first).await.unwrap();

        let clash = Item::new(org_a, "Oil".into(), "other".into(), price.clone(), 1);
        assert!(matches!(
            store.insert(&clash).await,
            Err(DatabaseError::UniqueConstraintViolation(_))
        ));

        let elsewhere = Item::new(org_b, "Oil".into(), "5W30".into(), price, 1);
        store.insert(&elsewhere).await.unwrap();

        assert_eq!(store.list_by_organisation(org_a).await.unwrap().len(), 1);
        assert_eq!(store.list_by_organisation(org_b).await.unwrap().len(), 1);

        assert_eq!(store.delete_by_organisation(org_a).await.unwrap(), 1);
        assert!(store.list_by_organisation(org_a).await.unwrap().is_empty());
        assert_eq!(store.list_by_organisation(org_b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_item_rename_to_existing_name_fails() {
        let store = MemoryItemStore::default();
        let org = Uuid::new_v4();
        let price = Price { amount: 1.0, currency: "EUR".to_string() };
        let oil = Item::new(org, "Oil".into(), "".into(), price.clone(), 1);
        let filter = Item::new(org, "Filter".into(), "".into(), price, 1);
        store.insert(&oil).await.unwrap();
        store.insert(&filter).await.unwrap();

        let rename = ItemUpdate { name: Some("Oil".to_string()), ..Default::default() };
        assert!(matches!(
            store.update(filter.id, &rename).await,
            Err(DatabaseError::UniqueConstraintViolation(_))
        ));

        let restock = ItemUpdate { quantity: Some(40), ..Default::default() };
        assert_eq!(store.update(filter.id, &restock).await.unwrap().quantity, 40);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

/// A registered account.
///
/// Deliberately not `Serialize`: the only outward shape is [`UserPublic`],
/// which has no password field.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Trimmed and lowercased; unique across the store
    pub email: String,
    pub password_hash: String,
    pub location: String,
    pub role: Role,
    pub organisation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds a fresh account with the default role and no organisation
    pub fn new(
        first_name: String,
        last_name: String,
        email: String,
        password_hash: String,
        location: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            email,
            password_hash,
            location,
            role: Role::User,
            organisation_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            location: self.location.clone(),
            organisation_id: self.organisation_id,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPublic {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organisation_id: Option<Uuid>,
    pub role: Role,
}

/// Fields an `update_fields` call may overwrite; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub location: Option<String>,
    pub password_hash: Option<String>,
    pub organisation_id: Option<Uuid>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.location.is_none()
            && self.password_hash.is_none()
            && self.organisation_id.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(first_name) = &self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(location) = &self.location {
            user.location = location.clone();
        }
        if let Some(password_hash) = &self.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(organisation_id) = self.organisation_id {
            user.organisation_id = Some(organisation_id);
        }
        user.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new(
            "Alice".to_string(),
            "Liddell".to_string(),
            "alice@example.com".to_string(),
            "$2b$04$hash".to_string(),
            "Oxford".to_string(),
        )
    }

    #[test]
    fn test_public_view_has_no_password() {
        let json = serde_json::to_value(alice().to_public()).unwrap();

        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let mut user = alice();
        let update = UserUpdate {
            location: Some("London".to_string()),
            ..Default::default()
        };
        update.apply(&mut user);

        assert_eq!(user.location, "London");
        assert_eq!(user.first_name, "Alice");
        assert!(user.organisation_id.is_none());
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::Admin, Role::User] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("owner"), None);
    }
}

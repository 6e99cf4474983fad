use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed set of roles an identity can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    RestaurantAdmin,
    SuperAdmin,
}

#[derive(Debug, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::RestaurantAdmin => "restaurantadmin",
            Role::SuperAdmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "restaurantadmin" => Ok(Role::RestaurantAdmin),
            "superadmin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A registered principal as stored in the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub social_provider: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

/// An identity that has not been stored yet; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub social_provider: Option<String>,
    pub role: Role,
}

impl NewIdentity {
    pub fn local(name: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            name,
            email,
            password_hash,
            social_provider: None,
            role,
        }
    }

    /// Federated accounts carry no password hash, so password login never succeeds for them.
    pub fn federated(name: String, email: String, provider: &str) -> Self {
        Self {
            name,
            email,
            password_hash: String::new(),
            social_provider: Some(provider.to_string()),
            role: Role::User,
        }
    }
}

/// Public view of an identity; never exposes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityOut {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&Identity> for IdentityOut {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
        }
    }
}

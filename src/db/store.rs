//! Credential store adapters.
//!
//! The authentication core needs exactly three operations from persistence:
//! lookup by email, lookup by id, and insert-if-absent. `PgCredentialStore`
//! backs them with Postgres; `InMemoryCredentialStore` serves tests and local
//! runs without a database.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::models::{Identity, NewIdentity};
use crate::error::{AppError, DatabaseError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError>;

    /// Stores a new identity. Fails with `DatabaseError::Duplicate` when the
    /// email is already taken, leaving the store unchanged.
    async fn insert(&self, identity: NewIdentity) -> Result<Identity, AppError>;
}

const IDENTITY_COLUMNS: &str = "id, name, email, password_hash, social_provider, role, created_at";

pub struct PgCredentialStore {
    pool: Arc<PgPool>,
}

impl PgCredentialStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &Arc<PgPool> {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", IDENTITY_COLUMNS);
        let identity = sqlx::query_as::<_, Identity>(&query)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(identity)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", IDENTITY_COLUMNS);
        let identity = sqlx::query_as::<_, Identity>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(identity)
    }

    async fn insert(&self, identity: NewIdentity) -> Result<Identity, AppError> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, social_provider, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            IDENTITY_COLUMNS
        );
        let stored = sqlx::query_as::<_, Identity>(&query)
            .bind(&identity.name)
            .bind(&identity.email)
            .bind(&identity.password_hash)
            .bind(&identity.social_provider)
            .bind(identity.role.as_str())
            .fetch_optional(self.pool.as_ref())
            .await?;

        match stored {
            Some(stored) => {
                debug!("Stored identity {} with role {}", stored.id, stored.role);
                Ok(stored)
            }
            None => Err(AppError::DatabaseError(DatabaseError::Duplicate)),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    next_id: i64,
    rows: BTreeMap<i64, Identity>,
}

/// Process-local store. The write lock makes insert-if-absent atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCredentialStore {
    table: Arc<RwLock<MemoryTable>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn remove(&self, id: i64) -> Option<Identity> {
        self.table.write().await.rows.remove(&id)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let table = self.table.read().await;
        Ok(table.rows.values().find(|row| row.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AppError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn insert(&self, identity: NewIdentity) -> Result<Identity, AppError> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|row| row.email == identity.email) {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }

        table.next_id += 1;
        let stored = Identity {
            id: table.next_id,
            name: identity.name,
            email: identity.email,
            password_hash: identity.password_hash,
            social_provider: identity.social_provider,
            role: identity.role,
            created_at: Utc::now(),
        };
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;

    fn new_identity(email: &str) -> NewIdentity {
        NewIdentity::local("Test".into(), email.into(), "$2b$04$hash".into(), Role::User)
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_finds() {
        let store = InMemoryCredentialStore::new();
        let a = store.insert(new_identity("a@x.com")).await.unwrap();
        let b = store.insert(new_identity("b@x.com")).await.unwrap();
        assert_ne!(a.id, b.id);

        let found = store.find_by_email("b@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, b.id);
        let found = store.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(found.email, "a@x.com");
        assert!(store.find_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_without_second_row() {
        let store = InMemoryCredentialStore::new();
        store.insert(new_identity("a@x.com")).await.unwrap();

        let err = store.insert(new_identity("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::Duplicate)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_sensitive() {
        let store = InMemoryCredentialStore::new();
        store.insert(new_identity("a@x.com")).await.unwrap();
        assert!(store.find_by_email("A@X.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_same_email() {
        let store = InMemoryCredentialStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(new_identity("race@x.com")).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.len().await, 1);
    }
}

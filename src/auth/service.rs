use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::auth::google::FederatedIdentity;
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::token::TokenService;
use crate::db::models::{Identity, NewIdentity, Role};
use crate::db::store::CredentialStore;
use crate::error::{AppError, AuthError, DatabaseError};

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError("Name must not be empty".into()));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(AppError::ValidationError("A valid email is required".into()));
        }
        validate_password(&self.password)
    }
}

/// Credential flows on top of a store and a token service: registration,
/// password login and federated login.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    bcrypt_cost: u32,
    // Verified against when there is no real digest, so every failed login costs one bcrypt check.
    decoy_digest: OnceCell<String>,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<TokenService>, bcrypt_cost: u32) -> Self {
        Self {
            store,
            tokens,
            bcrypt_cost,
            decoy_digest: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub async fn register(&self, registration: Registration, role: Role) -> Result<Identity, AppError> {
        registration.validate()?;

        // Cheap rejection before paying for a hash; the store still enforces uniqueness.
        if self.store.find_by_email(&registration.email).await?.is_some() {
            return Err(DatabaseError::Duplicate.into());
        }

        let password_hash = hash_password(&registration.password, self.bcrypt_cost).await?;
        let identity = self
            .store
            .insert(NewIdentity::local(
                registration.name,
                registration.email,
                password_hash,
                role,
            ))
            .await?;

        info!("Registered identity {} with role {}", identity.id, identity.role);
        Ok(identity)
    }

    async fn decoy_digest(&self) -> Result<&str, AppError> {
        self.decoy_digest
            .get_or_try_init(|| hash_password("decoy-password", self.bcrypt_cost))
            .await
            .map(String::as_str)
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown email, wrong password, passwordless account and role mismatch
    /// all produce the same `InvalidCredentials` error after the same amount
    /// of bcrypt work.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        required_role: Option<Role>,
    ) -> Result<String, AppError> {
        let identity = self.store.find_by_email(email).await?;

        let digest = match identity.as_ref().filter(|identity| identity.has_password()) {
            Some(identity) => identity.password_hash.as_str(),
            None => self.decoy_digest().await?,
        };
        let password_ok = verify_password(password, digest).await;

        let identity = match identity {
            Some(identity) if identity.has_password() && password_ok => identity,
            Some(identity) => {
                warn!("Password mismatch for identity {}", identity.id);
                return Err(AuthError::InvalidCredentials.into());
            }
            None => {
                warn!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if let Some(role) = required_role {
            if identity.role != role {
                warn!("Login for identity {} on the {} endpoint refused", identity.id, role);
                return Err(AuthError::InvalidCredentials.into());
            }
        }

        self.tokens.issue(identity.id, identity.role)
    }

    /// Find or create the identity behind a verified federated login, then issue a token.
    pub async fn federated_login(&self, federated: FederatedIdentity) -> Result<String, AppError> {
        let identity = match self.store.find_by_email(&federated.email).await? {
            Some(identity) => identity,
            None => {
                let new = NewIdentity::federated(
                    federated.display_name.clone(),
                    federated.email.clone(),
                    federated.provider,
                );
                match self.store.insert(new).await {
                    Ok(identity) => {
                        info!("Created identity {} from {} sign-in", identity.id, federated.provider);
                        identity
                    }
                    // Lost a race with a concurrent first sign-in for the same email.
                    Err(AppError::DatabaseError(DatabaseError::Duplicate)) => self
                        .store
                        .find_by_email(&federated.email)
                        .await?
                        .ok_or(DatabaseError::NotFound)?,
                    Err(e) => return Err(e),
                }
            }
        };

        self.tokens.issue(identity.id, identity.role)
    }
}

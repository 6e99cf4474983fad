//! Per-request role gate.
//!
//! Routes declare the roles they accept by registering a [`RequiredRoles`]
//! value as app data on their scope or resource:
//!
//! ```rust,ignore
//! web::scope("/admin")
//!     .app_data(RequiredRoles::only(Role::SuperAdmin))
//!     .route("/restaurant-admins", web::post().to(create_restaurant_admin))
//! ```
//!
//! Handlers then take a [`CurrentIdentity`] argument. Extraction runs the gate:
//! bearer token, token validation, store lookup of the subject, role check.
//! The identity's role is re-read from the store on every request, so a role
//! change takes effect before the token expires.

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::debug;

use crate::auth::token::TokenService;
use crate::db::models::{Identity, Role};
use crate::db::store::CredentialStore;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Role set a route accepts. Routes without one accept any authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredRoles(Vec<Role>);

impl RequiredRoles {
    pub fn only(role: Role) -> Self {
        Self(vec![role])
    }

    pub fn any_of(roles: &[Role]) -> Self {
        Self(roles.to_vec())
    }

    pub fn permits(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| {
            let (scheme, token) = h.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

pub struct RoleGate<'a> {
    tokens: &'a TokenService,
    store: &'a dyn CredentialStore,
}

impl<'a> RoleGate<'a> {
    pub fn new(tokens: &'a TokenService, store: &'a dyn CredentialStore) -> Self {
        Self { tokens, store }
    }

    /// Runs the gate for one request. The only side effect is the store lookup.
    pub async fn evaluate(
        &self,
        token: Option<&str>,
        required: Option<&RequiredRoles>,
    ) -> Result<Identity, AppError> {
        let token = token.ok_or(AuthError::MissingToken)?;
        let claims = self.tokens.validate(token)?;
        let identity_id = claims.identity_id()?;

        let identity = self
            .store
            .find_by_id(identity_id)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;

        if let Some(required) = required {
            if !required.permits(identity.role) {
                debug!("Identity {} with role {} refused by role gate", identity.id, identity.role);
                return Err(AuthError::Forbidden.into());
            }
        }

        Ok(identity)
    }
}

/// The authenticated caller, resolved by the role gate.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl CurrentIdentity {
    pub fn into_inner(self) -> Identity {
        self.0
    }
}

impl std::ops::Deref for CurrentIdentity {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.0
    }
}

impl FromRequest for CurrentIdentity {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let required = req.app_data::<RequiredRoles>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                AppError::InternalError("application state is not registered".into())
            })?;
            let auth = &state.auth_service;
            let gate = RoleGate::new(auth.tokens().as_ref(), auth.store().as_ref());
            gate.evaluate(token.as_deref(), required.as_ref())
                .await
                .map(CurrentIdentity)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MockCredentialStore;
    use actix_web::test::TestRequest;
    use chrono::{Duration, Utc};
    use jsonwebtoken::Algorithm;
    use mockall::predicate::eq;

    fn tokens() -> TokenService {
        TokenService::new(b"gate-secret", Algorithm::HS256, Duration::hours(24))
    }

    fn identity(id: i64, role: Role) -> Identity {
        Identity {
            id,
            name: "Gate Test".into(),
            email: format!("{}@x.com", id),
            password_hash: String::new(),
            social_provider: None,
            role,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_token_never_touches_store() {
        let tokens = tokens();
        let mut store = MockCredentialStore::new();
        store.expect_find_by_id().never();

        let err = RoleGate::new(&tokens, &store).evaluate(None, None).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn test_invalid_token_never_touches_store() {
        let tokens = tokens();
        let mut store = MockCredentialStore::new();
        store.expect_find_by_id().never();

        let err = RoleGate::new(&tokens, &store)
            .evaluate(Some("garbage"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }

    #[test_log::test(tokio::test)]
    async fn test_deleted_identity_is_not_found() {
        let tokens = tokens();
        let token = tokens.issue(5, Role::User).unwrap();
        let mut store = MockCredentialStore::new();
        store.expect_find_by_id().with(eq(5)).times(1).returning(|_| Ok(None));

        let err = RoleGate::new(&tokens, &store)
            .evaluate(Some(&token), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::IdentityNotFound)));
    }

    #[tokio::test]
    async fn test_role_outside_set_is_forbidden() {
        let tokens = tokens();
        let token = tokens.issue(5, Role::User).unwrap();
        let mut store = MockCredentialStore::new();
        store.expect_find_by_id().returning(|id| Ok(Some(identity(id, Role::User))));

        let required = RequiredRoles::only(Role::SuperAdmin);
        let err = RoleGate::new(&tokens, &store)
            .evaluate(Some(&token), Some(&required))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::Forbidden)));
    }

    #[test_log::test(tokio::test)]
    async fn test_role_is_taken_from_store_not_claims() {
        let tokens = tokens();
        // Token still says superadmin, but the identity was demoted.
        let token = tokens.issue(9, Role::SuperAdmin).unwrap();
        let mut store = MockCredentialStore::new();
        store.expect_find_by_id().returning(|id| Ok(Some(identity(id, Role::User))));

        let required = RequiredRoles::only(Role::SuperAdmin);
        let err = RoleGate::new(&tokens, &store)
            .evaluate(Some(&token), Some(&required))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_member_role_is_admitted() {
        let tokens = tokens();
        let token = tokens.issue(3, Role::RestaurantAdmin).unwrap();
        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_id()
            .with(eq(3))
            .returning(|id| Ok(Some(identity(id, Role::RestaurantAdmin))));

        let required = RequiredRoles::any_of(&[Role::RestaurantAdmin, Role::SuperAdmin]);
        let admitted = RoleGate::new(&tokens, &store)
            .evaluate(Some(&token), Some(&required))
            .await
            .unwrap();
        assert_eq!(admitted.id, 3);
        assert_eq!(admitted.role, Role::RestaurantAdmin);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "bearer abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwdw=="))
            .to_http_request();
        assert!(bearer_token(&req).is_none());

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer "))
            .to_http_request();
        assert!(bearer_token(&req).is_none());

        let req = TestRequest::default().to_http_request();
        assert!(bearer_token(&req).is_none());
    }
}

use actix_web::{web, Either, HttpResponse};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::auth::gate::CurrentIdentity;
use crate::auth::service::Registration;
use crate::db::models::{IdentityOut, Role};
use crate::error::{AppError, AuthError, DatabaseError};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// OAuth2 password grant, form-encoded. `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct PasswordGrantForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub grant_type: Option<String>,
}

impl From<PasswordGrantForm> for LoginRequest {
    fn from(form: PasswordGrantForm) -> Self {
        Self {
            email: form.username,
            password: form.password,
        }
    }
}

type LoginBody = Either<web::Json<LoginRequest>, web::Form<PasswordGrantForm>>;

fn into_login(body: LoginBody) -> Result<LoginRequest, AppError> {
    match body {
        Either::Left(json) => Ok(json.into_inner()),
        Either::Right(form) => {
            let form = form.into_inner();
            if let Some(grant) = form.grant_type.as_deref() {
                if grant != "password" {
                    return Err(AppError::ValidationError(format!("unsupported grant_type '{}'", grant)));
                }
            }
            Ok(form.into())
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            password: req.password,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

async fn register_as(
    role: Role,
    req: RegisterRequest,
    state: &AppState,
) -> Result<HttpResponse, AppError> {
    info!("Received {} registration request for email: {}", role, req.email);
    let identity = state.auth_service.register(req.into(), role).await?;
    Ok(HttpResponse::Created().json(IdentityOut::from(&identity)))
}

async fn login_as(
    role: Option<Role>,
    body: LoginBody,
    state: &AppState,
) -> Result<HttpResponse, AppError> {
    let req = into_login(body)?;
    info!("Received login request for email: {}", req.email);
    match state.auth_service.authenticate(&req.email, &req.password, role).await {
        Ok(token) => {
            info!("Login successful for email: {}", req.email);
            Ok(HttpResponse::Ok().json(TokenResponse::bearer(token)))
        }
        Err(e) => {
            warn!("Login failed for email: {}", req.email);
            Err(e)
        }
    }
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    register_as(Role::User, req.into_inner(), &state).await
}

pub async fn register_restaurant_admin(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    register_as(Role::RestaurantAdmin, req.into_inner(), &state).await
}

pub async fn register_superadmin(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.config.auth.allow_superadmin_signup {
        warn!("Refused superadmin self-registration for email: {}", req.email);
        return Err(AuthError::SignupDisabled.into());
    }
    register_as(Role::SuperAdmin, req.into_inner(), &state).await
}

pub async fn login(body: LoginBody, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    login_as(None, body, &state).await
}

pub async fn user_login(body: LoginBody, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    login_as(Some(Role::User), body, &state).await
}

pub async fn restaurant_login(body: LoginBody, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    login_as(Some(Role::RestaurantAdmin), body, &state).await
}

pub async fn superadmin_login(body: LoginBody, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    login_as(Some(Role::SuperAdmin), body, &state).await
}

pub async fn google_login(
    req: web::Json<GoogleLoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let federated = state.identity_provider.verify(&req.id_token).await?;
    info!("Google sign-in verified for email: {}", federated.email);
    let token = state.auth_service.federated_login(federated).await?;
    Ok(HttpResponse::Ok().json(TokenResponse::bearer(token)))
}

pub async fn me(identity: CurrentIdentity) -> HttpResponse {
    HttpResponse::Ok().json(IdentityOut::from(&*identity))
}

/// Superadmin onboarding of a restaurant admin account.
pub async fn create_restaurant_admin(
    admin: CurrentIdentity,
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Superadmin {} creating restaurant admin {}", admin.id, req.email);
    register_as(Role::RestaurantAdmin, req.into_inner(), &state).await
}

pub async fn get_identity(
    _admin: CurrentIdentity,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let identity = state
        .auth_service
        .store()
        .find_by_id(path.into_inner())
        .await?
        .ok_or(DatabaseError::NotFound)?;
    Ok(HttpResponse::Ok().json(IdentityOut::from(&identity)))
}

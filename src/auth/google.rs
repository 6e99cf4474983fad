//! Federated identity exchange.
//!
//! A provider turns an external credential into a verified
//! `(email, display name)` pair; the auth service then treats it like a
//! local registration followed by login.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::GoogleConfig;
use crate::error::{AppError, AuthError};

pub const GOOGLE_PROVIDER: &str = "google";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: &'static str,
    pub email: String,
    pub display_name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<FederatedIdentity, AppError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    email: Option<String>,
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
}

impl TokenInfo {
    /// Google reports the flag as the string `"true"`; accept a JSON bool too.
    fn email_is_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::String(flag)) => flag == "true",
            Some(serde_json::Value::Bool(flag)) => *flag,
            _ => false,
        }
    }
}

/// Verifies Google ID tokens against the token-info endpoint.
pub struct GoogleVerifier {
    client: reqwest::Client,
    tokeninfo_url: Url,
    client_id: Option<String>,
}

impl GoogleVerifier {
    pub fn new(config: &GoogleConfig) -> Result<Self, AppError> {
        let tokeninfo_url = Url::parse(&config.tokeninfo_url)
            .map_err(|e| AppError::ConfigError(format!("invalid google.tokeninfo_url: {}", e)))?;

        if config.client_id.is_none() {
            warn!("google.client_id is not configured; Google sign-in will be refused");
        }

        Ok(Self {
            client: reqwest::Client::new(),
            tokeninfo_url,
            client_id: config.client_id.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleVerifier {
    async fn verify(&self, id_token: &str) -> Result<FederatedIdentity, AppError> {
        let client_id = self.client_id.as_deref().ok_or(AuthError::InvalidCredentials)?;

        let mut url = self.tokeninfo_url.clone();
        url.query_pairs_mut().append_pair("id_token", id_token);

        let res = self.client.get(url).send().await?;
        if !res.status().is_success() {
            debug!("Google rejected ID token with status {}", res.status());
            return Err(AuthError::InvalidCredentials.into());
        }

        let info: TokenInfo = res.json().await?;
        if info.aud.as_deref() != Some(client_id) {
            debug!("Google ID token issued for another audience: {:?}", info.aud);
            return Err(AuthError::InvalidCredentials.into());
        }
        if !info.email_is_verified() {
            debug!("Google ID token carries an unverified email");
            return Err(AuthError::InvalidCredentials.into());
        }

        let email = info
            .email
            .filter(|email| !email.is_empty())
            .ok_or(AuthError::InvalidCredentials)?;
        let display_name = info
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

        Ok(FederatedIdentity {
            provider: GOOGLE_PROVIDER,
            email,
            display_name,
        })
    }
}

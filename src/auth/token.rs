use crate::config::AuthConfig;
use crate::db::models::Role;
use crate::error::{AppError, AuthError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Identity ID
    pub role: Role,
    pub iat: i64,     // Issued at
    pub exp: i64,     // Expiration time
}

impl Claims {
    pub fn identity_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// Issues and validates bearer tokens.
///
/// Holds only immutable key material, so one instance is shared by every
/// request without locking.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    expiry: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], algorithm: Algorithm, expiry: Duration) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            validation,
            expiry,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        let algorithm = config.algorithm()?;
        Ok(Self::new(
            config.jwt_secret.as_bytes(),
            algorithm,
            Duration::hours(config.token_expiry_hours),
        ))
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn issue(&self, identity_id: i64, role: Role) -> Result<String, AppError> {
        self.issue_at(identity_id, role, Utc::now())
    }

    pub(crate) fn issue_at(&self, identity_id: i64, role: Role, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            sub: identity_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("token signing failed: {}", e)))
    }

    /// Decode and verify a token. Every failure maps to `AuthError::InvalidToken`;
    /// the cause is only logged.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                data.claims.identity_id()?;
                Ok(data.claims)
            }
            Err(e) => {
                debug!("Rejected bearer token: {:?}", e.kind());
                Err(AuthError::InvalidToken)
            }
        }
    }
}

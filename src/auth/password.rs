use crate::error::AppError;
use bcrypt::{hash, verify};
use tracing::debug;

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a password with bcrypt at the given cost.
///
/// Each call draws a fresh salt, so hashing the same password twice gives
/// different digests. Runs on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();

    tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(|e| AppError::InternalError(format!("hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Check a password against a stored digest.
///
/// A digest that bcrypt cannot parse (including the empty digest of
/// federated accounts) never matches.
pub async fn verify_password(password: &str, digest: &str) -> bool {
    if digest.is_empty() {
        return false;
    }
    let password = password.to_string();
    let digest = digest.to_string();

    match tokio::task::spawn_blocking(move || verify(password, &digest)).await {
        Ok(Ok(matches)) => matches,
        Ok(Err(e)) => {
            debug!("Stored digest could not be verified: {}", e);
            false
        }
        Err(e) => {
            debug!("Verification task failed: {}", e);
            false
        }
    }
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::ValidationError("Password must not be empty".into()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::ValidationError(format!(
            "Password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

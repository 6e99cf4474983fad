use tracing::{info, warn};

use crate::auth::service::{AuthService, Registration};
use crate::db::models::Role;
use crate::error::{AppError, DatabaseError};

/// Demo accounts, one per role.
pub const DEMO_ACCOUNTS: [(&str, &str, &str, Role); 3] = [
    ("Super Admin", "superadmin@zenzomato.com", "superadmin123", Role::SuperAdmin),
    ("Rest Admin", "restadmin@zenzomato.com", "restadmin123", Role::RestaurantAdmin),
    ("Test User", "user@zenzomato.com", "user123", Role::User),
];

/// Insert the demo accounts that are not present yet. Returns how many were created.
pub async fn seed_demo_accounts(auth: &AuthService) -> Result<usize, AppError> {
    let mut created = 0;
    for (name, email, password, role) in DEMO_ACCOUNTS {
        let registration = Registration {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        match auth.register(registration, role).await {
            Ok(_) => created += 1,
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {}
            Err(e) => return Err(e),
        }
    }

    if created > 0 {
        info!("Seeded {} demo accounts", created);
        warn!("Demo accounts use well-known passwords; disable seeding outside development");
    }
    Ok(created)
}

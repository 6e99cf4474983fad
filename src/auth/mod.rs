//! Authentication module for the ZenZomato server
//!
//! Password hashing, bearer token issuance and validation,
//! federated sign-in and the per-request role gate.

pub mod gate;
pub mod google;
pub mod handlers;
pub mod password;
pub mod service;
pub mod token;

pub use gate::{CurrentIdentity, RequiredRoles, RoleGate};
pub use google::{FederatedIdentity, GoogleVerifier, IdentityProvider};
pub use service::{AuthService, Registration};
pub use token::{Claims, TokenService};

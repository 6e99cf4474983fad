//! Database module for the ZenZomato server
//!
//! Identity records, the credential store adapters over them,
//! and the demo account seed.

pub mod models;
pub mod seed;
pub mod store;

pub use models::{Identity, IdentityOut, NewIdentity, Role};
pub use store::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};

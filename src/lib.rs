// Graph Token Manager - Library root

pub mod auth;
pub mod config;
pub mod error;

pub use auth::{CredentialSet, TokenCoordinator};
pub use config::AuthConfig;
pub use error::{AuthError, StoreError};

// Authentication module
// Credential persistence, expiry policy, token endpoint exchanges and the
// coordinator that ties them together

mod coordinator;
mod expiry;
mod refresh;
mod store;
mod types;

pub use coordinator::TokenCoordinator;
pub use expiry::{needs_renewal, needs_renewal_at, REFRESH_BUFFER_MS};
pub use refresh::RefreshClient;
pub use store::TokenStore;
pub use types::{CredentialSet, TokenResponse, TEST_TOKEN_LIFETIME_SECS};

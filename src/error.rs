// Error handling module
// Defines the token store and credential lifecycle error types

use std::path::PathBuf;
use thiserror::Error;

/// Failures at the token store boundary.
///
/// A missing or structurally invalid record is not an error: the store reports
/// it as `Ok(None)`. These variants cover the cases where the record could not
/// be read or written at all.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The record exists but could not be read
    #[error("Failed to read token record {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    /// The record could not be written or replaced
    #[error("Failed to write token record {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    /// The credential set could not be encoded
    #[error("Failed to serialize token record: {0}")]
    Serialize(String),
}

/// Errors that can occur while acquiring or renewing credentials.
///
/// `Clone` so one renewal outcome can be handed to every caller that joined it.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// Client credentials or endpoint configuration missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure talking to the identity provider
    #[error("Network error: {0}")]
    Network(String),

    /// Provider response could not be understood
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Provider explicitly rejected the request
    #[error("Identity provider error: {status} - {error}: {description}")]
    Provider {
        status: u16,
        error: String,
        description: String,
    },

    /// Token store failure
    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    /// Renewal task died before producing an outcome
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AuthError::Config("MS_CLIENT_ID is not set".to_string());
        assert_eq!(err.to_string(), "Configuration error: MS_CLIENT_ID is not set");

        let err = AuthError::Provider {
            status: 400,
            error: "invalid_grant".to_string(),
            description: "The refresh token has expired".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Identity provider error: 400 - invalid_grant: The refresh token has expired"
        );

        let err = AuthError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_store_error_includes_path() {
        let err = StoreError::Write {
            path: PathBuf::from("/tmp/tokens.json"),
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to write token record /tmp/tokens.json: permission denied"
        );
    }

    #[test]
    fn test_store_error_converts_into_auth_error() {
        let err: AuthError = StoreError::Serialize("bad".to_string()).into();
        assert!(matches!(err, AuthError::Store(StoreError::Serialize(_))));
        assert_eq!(
            err.to_string(),
            "Token store error: Failed to serialize token record: bad"
        );
    }
}

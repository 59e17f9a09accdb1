//! Authentication error types.

use keyvault_ops::KeyVaultError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Session expired")]
    SessionExpired,

    /// Input not accepted by the auth FSM in its current state
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// An `az` invocation failed
    #[error("Azure CLI error: {0}")]
    Cli(#[from] KeyVaultError),

    #[error("Failed to start Azure CLI: {0}")]
    Spawn(String),

    /// Authorization or token endpoint returned an error
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Redirect carried a `state` that does not match the request
    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Storage error: {0}")]
    Storage(#[from] akv_storage::StorageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Operation timed out")]
    Timeout,

    #[error("Network unavailable")]
    NetworkUnavailable,

    #[error("Configuration error: {0}")]
    Config(String),

    /// The owning service has been disposed
    #[error("Auth service disposed")]
    Disposed,
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable | AuthError::Timeout => true,
            AuthError::Cli(KeyVaultError::Timeout { .. }) => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }

    /// True when the CLI reported that no login exists.
    pub fn is_not_logged_in(&self) -> bool {
        matches!(
            self,
            AuthError::NotLoggedIn | AuthError::Cli(KeyVaultError::NotLoggedIn { .. })
        )
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

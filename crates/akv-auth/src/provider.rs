use crate::AuthResult;
use akv_config_and_utils::AuthStrategy;
use akv_storage::{AuthTokens, SessionStore, UserInfo};
use async_trait::async_trait;
use std::time::Duration;

/// A signed-in identity, with tokens for token-based flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: UserInfo,
    pub tokens: Option<AuthTokens>,
}

impl Session {
    pub fn new(user: UserInfo, tokens: Option<AuthTokens>) -> Self {
        Self { user, tokens }
    }

    /// CLI-backed sessions carry no tokens and never expire locally.
    pub fn is_expired(&self) -> bool {
        self.tokens.as_ref().is_some_and(AuthTokens::is_expired)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().and_then(|t| t.refresh_token.as_deref())
    }
}

/// One authentication strategy. Providers are stateless with respect to the
/// session; [`crate::AuthService`] owns it.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn strategy(&self) -> AuthStrategy;

    /// Look for a session that survives from an earlier run.
    async fn probe(&self, store: &SessionStore) -> AuthResult<Option<Session>>;

    /// Run the interactive flow.
    async fn login(&self) -> AuthResult<Session>;

    /// Best-effort revocation.
    async fn logout(&self, session: Option<&Session>) -> AuthResult<()>;

    /// `Ok(false)` when the session is no longer usable.
    async fn validate(&self, session: &Session) -> AuthResult<bool>;

    /// Produce a replacement session.
    async fn refresh(&self, session: &Session) -> AuthResult<Session>;

    /// Whether tokens can be renewed silently before they expire.
    fn supports_refresh(&self) -> bool;

    fn session_check_interval(&self) -> Duration;
}

//! Offline provider that signs in a fixed demo user.

use crate::{AuthError, AuthProvider, AuthResult, Session};
use akv_config_and_utils::AuthStrategy;
use akv_storage::{AuthTokens, SessionStore, UserInfo};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

pub const MOCK_SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);

const MOCK_TOKEN_LIFETIME_SECS: i64 = 60 * 60;

pub const MOCK_USER_ID: &str = "mock-user-0001";

#[derive(Debug, Default)]
pub struct MockAuth;

impl MockAuth {
    pub fn new() -> Self {
        Self
    }

    pub fn demo_user() -> UserInfo {
        UserInfo {
            id: MOCK_USER_ID.to_string(),
            email: "demo@akv-manager.local".to_string(),
            name: "Demo User".to_string(),
            tenant_id: Some("mock-tenant".to_string()),
            roles: vec!["Key Vault Administrator".to_string()],
            last_login: Utc::now(),
        }
    }

    fn issue_tokens() -> AuthTokens {
        let id = uuid::Uuid::new_v4();
        AuthTokens::expiring_in(
            format!("mock-access-{id}"),
            Some(format!("mock-refresh-{id}")),
            MOCK_TOKEN_LIFETIME_SECS,
            vec!["https://vault.azure.net/user_impersonation".to_string()],
        )
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    fn strategy(&self) -> AuthStrategy {
        AuthStrategy::Mock
    }

    async fn probe(&self, store: &SessionStore) -> AuthResult<Option<Session>> {
        let (Some(user), Some(tokens)) = (store.load_user()?, store.load_tokens()?) else {
            return Ok(None);
        };
        if tokens.is_expired() {
            debug!("stored mock session expired");
            return Ok(None);
        }
        Ok(Some(Session::new(user, Some(tokens))))
    }

    async fn login(&self) -> AuthResult<Session> {
        Ok(Session::new(Self::demo_user(), Some(Self::issue_tokens())))
    }

    async fn logout(&self, _session: Option<&Session>) -> AuthResult<()> {
        Ok(())
    }

    async fn validate(&self, session: &Session) -> AuthResult<bool> {
        Ok(!session.is_expired())
    }

    async fn refresh(&self, session: &Session) -> AuthResult<Session> {
        if session.refresh_token().is_none() {
            return Err(AuthError::TokenRefresh("no refresh token".into()));
        }
        Ok(Session::new(session.user.clone(), Some(Self::issue_tokens())))
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    fn session_check_interval(&self) -> Duration {
        MOCK_SESSION_CHECK_INTERVAL
    }
}

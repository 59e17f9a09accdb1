//! Session records persisted by [`crate::SessionStore`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens are treated as "expiring soon" this long before `expires_at`.
pub const EXPIRY_LOOKAHEAD_SECS: i64 = 5 * 60;

/// Snapshot of the signed-in identity. Replaced wholesale on refresh or
/// re-login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub last_login: DateTime<Utc>,
}

/// Bearer credentials from a token-based flow.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AuthTokens {
    /// Tokens valid for `expires_in_secs` from now.
    pub fn expiring_in(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            token_type: default_token_type(),
            scopes,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// True when `expires_at` falls within the lookahead window, including
    /// tokens that have already expired.
    pub fn is_expiring_soon(&self) -> bool {
        self.is_expiring_soon_at(Utc::now())
    }

    pub fn is_expiring_soon_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now + Duration::seconds(EXPIRY_LOOKAHEAD_SECS)
    }

    /// Instant at which a silent refresh should run.
    pub fn refresh_due_at(&self) -> DateTime<Utc> {
        self.expires_at - Duration::seconds(EXPIRY_LOOKAHEAD_SECS)
    }
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .finish()
    }
}

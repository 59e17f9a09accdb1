use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived lifecycle state of a vault object. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceStatus {
    Active,
    Disabled,
    Expired,
    #[serde(rename = "Not Active")]
    NotActive,
}

impl ResourceStatus {
    /// Precedence: disabled, then expired, then not yet active.
    pub fn derive(
        enabled: bool,
        expires: Option<DateTime<Utc>>,
        not_before: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        if !enabled {
            ResourceStatus::Disabled
        } else if expires.is_some_and(|exp| exp < now) {
            ResourceStatus::Expired
        } else if not_before.is_some_and(|nbf| nbf > now) {
            ResourceStatus::NotActive
        } else {
            ResourceStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Active => "Active",
            ResourceStatus::Disabled => "Disabled",
            ResourceStatus::Expired => "Expired",
            ResourceStatus::NotActive => "Not Active",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn precedence_disabled_expired_not_active_active() {
        let now = Utc::now();
        let past = Some(now - Duration::days(1));
        let future = Some(now + Duration::days(1));

        assert_eq!(ResourceStatus::derive(false, past, future, now), ResourceStatus::Disabled);
        assert_eq!(ResourceStatus::derive(true, past, future, now), ResourceStatus::Expired);
        assert_eq!(ResourceStatus::derive(true, future, future, now), ResourceStatus::NotActive);
        assert_eq!(ResourceStatus::derive(true, future, past, now), ResourceStatus::Active);
        assert_eq!(ResourceStatus::derive(true, None, None, now), ResourceStatus::Active);
    }

    #[test]
    fn display_uses_human_labels() {
        assert_eq!(ResourceStatus::NotActive.to_string(), "Not Active");
        assert_eq!(ResourceStatus::Expired.to_string(), "Expired");
    }
}

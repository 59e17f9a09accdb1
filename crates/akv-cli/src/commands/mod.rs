//! Command implementations.

mod account;
mod auth;
mod cert;
mod key;
mod secret;
mod vault;

pub use account::{account_list, account_set};
pub use auth::{login, logout, status};
pub use cert::cert;
pub use key::key;
pub use secret::secret;
pub use vault::{vault_create, vault_delete, vault_list, vault_show};

use akv_config_and_utils::AuthStrategy;
use chrono::{DateTime, Utc};
use keyvault_ops::{ResourceAttributes, Tags};

/// `--tag key=value`.
pub fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

/// RFC 3339 timestamp, e.g. `2030-01-01T00:00:00Z`.
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", raw, e))
}

pub fn parse_strategy(raw: &str) -> Result<AuthStrategy, String> {
    raw.parse::<AuthStrategy>().map_err(|e| e.to_string())
}

/// Tags from repeated `--tag`, `None` when none were given.
pub(crate) fn tag_map(tags: Vec<(String, String)>) -> Option<Tags> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.into_iter().collect())
    }
}

pub(crate) fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn format_tags(tags: Option<&Tags>) -> String {
    match tags {
        Some(tags) if !tags.is_empty() => {
            let mut pairs: Vec<String> = tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            pairs.sort();
            pairs.join(", ")
        }
        _ => "-".to_string(),
    }
}

/// Shared attribute rows for secrets, keys and certificates.
pub(crate) fn print_attributes(attributes: &ResourceAttributes) {
    use crate::output::{or_dash, print_row};

    print_row("Status", attributes.status().as_str());
    print_row("Enabled", if attributes.enabled { "yes" } else { "no" });
    print_row("Created", &format_date(attributes.created));
    print_row("Updated", &format_date(attributes.updated));
    print_row("Expires", &format_date(attributes.expires));
    print_row("Not before", &format_date(attributes.not_before));
    print_row("Recovery level", &or_dash(attributes.recovery_level.as_deref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_requires_a_key() {
        assert_eq!(
            parse_tag("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(parse_tag("note=a=b").unwrap().1, "a=b");
        assert_eq!(parse_tag("empty=").unwrap().1, "");
        assert!(parse_tag("=prod").is_err());
        assert!(parse_tag("prod").is_err());
    }

    #[test]
    fn datetime_is_normalized_to_utc() {
        let dt = parse_datetime("2030-06-01T02:00:00+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2030-06-01T00:00:00+00:00");
        assert!(parse_datetime("next tuesday").is_err());
    }

    #[test]
    fn tags_render_sorted() {
        let tags: Tags = [("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())]
            .into_iter()
            .collect();
        assert_eq!(format_tags(Some(&tags)), "a=1, b=2");
        assert_eq!(format_tags(None), "-");
        assert!(tag_map(Vec::new()).is_none());
    }
}

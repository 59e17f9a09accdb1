//! Input checks run before any CLI call.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

pub const MAX_OBJECT_NAME_LEN: usize = 127;
pub const MAX_SECRET_VALUE_BYTES: usize = 25 * 1024;
pub const MAX_TAGS: usize = 15;
pub const MAX_TAG_NAME_LEN: usize = 512;
pub const MAX_TAG_VALUE_LEN: usize = 256;
pub const RSA_KEY_SIZES: [u32; 3] = [2048, 3072, 4096];
pub const RETENTION_DAYS: std::ops::RangeInclusive<u32> = 7..=90;

/// A rejected input, with a message suitable for showing to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

type Validation = Result<(), ValidationError>;

/// Secret, key and certificate names: 1-127 of `[0-9A-Za-z-]`.
pub fn validate_object_name(name: &str) -> Validation {
    if name.is_empty() {
        return Err(ValidationError::new("name", "Name is required"));
    }
    if name.len() > MAX_OBJECT_NAME_LEN {
        return Err(ValidationError::new(
            "name",
            format!("Name must be at most {MAX_OBJECT_NAME_LEN} characters"),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::new(
            "name",
            "Name may only contain letters, digits and hyphens",
        ));
    }
    Ok(())
}

/// Vault names: 3-24 characters, start with a letter, end with a letter or
/// digit, no consecutive hyphens.
pub fn validate_vault_name(name: &str) -> Validation {
    let err = |msg: &str| Err(ValidationError::new("vault_name", msg));

    if name.len() < 3 || name.len() > 24 {
        return err("Vault name must be 3-24 characters");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return err("Vault name may only contain letters, digits and hyphens");
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return err("Vault name must start with a letter");
    }
    if !name.ends_with(|c: char| c.is_ascii_alphanumeric()) {
        return err("Vault name must end with a letter or digit");
    }
    if name.contains("--") {
        return err("Vault name cannot contain consecutive hyphens");
    }
    Ok(())
}

/// Resource groups: 1-90 of word characters, `-`, `.`, `_`, `(`, `)`;
/// may not end with a period.
pub fn validate_resource_group(name: &str) -> Validation {
    let err = |msg: &str| Err(ValidationError::new("resource_group", msg));

    if name.is_empty() || name.chars().count() > 90 {
        return err("Resource group name must be 1-90 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')'))
    {
        return err(
            "Resource group name may only contain letters, digits, underscores, hyphens, periods and parentheses",
        );
    }
    if name.ends_with('.') {
        return err("Resource group name cannot end with a period");
    }
    Ok(())
}

/// Subscription ids are GUIDs (`8-4-4-4-12` hex digits).
pub fn validate_subscription_id(id: &str) -> Validation {
    let groups: Vec<&str> = id.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    let ok = groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()));

    if ok {
        Ok(())
    } else {
        Err(ValidationError::new(
            "subscription",
            "Subscription id must be a GUID",
        ))
    }
}

/// Locations are lowercase alphanumeric region names such as `westeurope`.
pub fn validate_location(location: &str) -> Validation {
    if !location.is_empty()
        && location
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(ValidationError::new(
            "location",
            "Location must be a lowercase region name such as westeurope",
        ))
    }
}

pub fn validate_secret_value(value: &str) -> Validation {
    if value.len() > MAX_SECRET_VALUE_BYTES {
        return Err(ValidationError::new(
            "value",
            format!(
                "Secret value is {} bytes; the limit is {} bytes",
                value.len(),
                MAX_SECRET_VALUE_BYTES
            ),
        ));
    }
    Ok(())
}

pub fn validate_tags(tags: &HashMap<String, String>) -> Validation {
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::new(
            "tags",
            format!("At most {MAX_TAGS} tags are allowed"),
        ));
    }
    for (name, value) in tags {
        if name.is_empty() {
            return Err(ValidationError::new("tags", "Tag names cannot be empty"));
        }
        if name.chars().count() > MAX_TAG_NAME_LEN {
            return Err(ValidationError::new(
                "tags",
                format!("Tag name '{name}' exceeds {MAX_TAG_NAME_LEN} characters"),
            ));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(ValidationError::new(
                "tags",
                format!("Value of tag '{name}' exceeds {MAX_TAG_VALUE_LEN} characters"),
            ));
        }
    }
    Ok(())
}

pub fn validate_rsa_key_size(size: u32) -> Validation {
    if RSA_KEY_SIZES.contains(&size) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "size",
            format!("RSA key size must be one of 2048, 3072 or 4096 (got {size})"),
        ))
    }
}

/// Soft-delete retention for new vaults.
pub fn validate_retention_days(days: u32) -> Validation {
    if RETENTION_DAYS.contains(&days) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "retention_days",
            format!("Retention must be between 7 and 90 days (got {days})"),
        ))
    }
}

/// `not_before` must precede `expires` when both are set.
pub fn validate_activation_window(
    not_before: Option<DateTime<Utc>>,
    expires: Option<DateTime<Utc>>,
) -> Validation {
    match (not_before, expires) {
        (Some(nbf), Some(exp)) if nbf >= exp => Err(ValidationError::new(
            "not_before",
            "Activation date must be before the expiration date",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn object_names() {
        assert!(validate_object_name("db-password-01").is_ok());
        assert!(validate_object_name(&"a".repeat(127)).is_ok());
        assert!(validate_object_name("").is_err());
        assert!(validate_object_name(&"a".repeat(128)).is_err());
        assert!(validate_object_name("has_underscore").is_err());
        assert!(validate_object_name("has space").is_err());
    }

    #[test]
    fn vault_names() {
        assert!(validate_vault_name("team-kv-01").is_ok());
        assert!(validate_vault_name("kv").is_err());
        assert!(validate_vault_name(&"a".repeat(25)).is_err());
        assert!(validate_vault_name("1vault").is_err());
        assert!(validate_vault_name("vault-").is_err());
        assert!(validate_vault_name("my--vault").is_err());
        assert!(validate_vault_name("my_vault").is_err());
    }

    #[test]
    fn resource_groups() {
        assert!(validate_resource_group("rg-prod_(east).1").is_ok());
        assert!(validate_resource_group("").is_err());
        assert!(validate_resource_group("ends.").is_err());
        assert!(validate_resource_group(&"r".repeat(91)).is_err());
        assert!(validate_resource_group("no/slash").is_err());
    }

    #[test]
    fn subscriptions_and_locations() {
        assert!(validate_subscription_id("0b1f6471-1bf0-4dda-aec3-cb9272f09590").is_ok());
        assert!(validate_subscription_id("0b1f64711bf04ddaaec3cb9272f09590").is_err());
        assert!(validate_subscription_id("zzzzzzzz-1bf0-4dda-aec3-cb9272f09590").is_err());
        assert!(validate_location("westeurope").is_ok());
        assert!(validate_location("West Europe").is_err());
    }

    #[test]
    fn secret_value_limit() {
        assert!(validate_secret_value(&"x".repeat(MAX_SECRET_VALUE_BYTES)).is_ok());
        let err = validate_secret_value(&"x".repeat(MAX_SECRET_VALUE_BYTES + 1)).unwrap_err();
        assert_eq!(err.field, "value");
    }

    #[test]
    fn tag_limits() {
        let mut tags: HashMap<String, String> =
            (0..15).map(|i| (format!("k{i}"), "v".to_string())).collect();
        assert!(validate_tags(&tags).is_ok());
        tags.insert("k15".into(), "v".into());
        assert!(validate_tags(&tags).is_err());

        let long_value = HashMap::from([("env".to_string(), "v".repeat(257))]);
        assert!(validate_tags(&long_value).is_err());
        let long_name = HashMap::from([("n".repeat(513), "v".to_string())]);
        assert!(validate_tags(&long_name).is_err());
    }

    #[test]
    fn rsa_sizes_and_activation_window() {
        assert!(validate_rsa_key_size(3072).is_ok());
        assert!(validate_rsa_key_size(1024).is_err());
        assert!(validate_retention_days(7).is_ok());
        assert!(validate_retention_days(91).is_err());

        let now = Utc::now();
        assert!(validate_activation_window(Some(now), Some(now + Duration::days(1))).is_ok());
        assert!(validate_activation_window(Some(now), Some(now)).is_err());
        assert!(validate_activation_window(None, Some(now)).is_ok());
    }
}

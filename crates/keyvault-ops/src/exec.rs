//! Shared plumbing for the services: run, classify, decode.

use crate::error::{classify_failure, KeyVaultError};
use crate::types::Tags;
use az_cli_runner::{AzCommand, CommandResult, CommandRunner};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) async fn run_checked(
    runner: &dyn CommandRunner,
    command: AzCommand,
    timeout_secs: u64,
) -> Result<CommandResult, KeyVaultError> {
    debug!(command = %command, "running az");
    let result = runner
        .run(&command, Some(Duration::from_secs(timeout_secs)))
        .await;

    if result.success {
        return Ok(result);
    }

    let err = classify_failure(&result);
    warn!(
        command = %command,
        code = err.code(),
        exit_code = ?result.exit_code,
        "az command failed"
    );
    Err(err)
}

/// Accepts an array, a single object, or empty output.
pub(crate) fn decode_list<T: DeserializeOwned>(
    output: &str,
    context: &str,
) -> Result<Vec<T>, KeyVaultError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| KeyVaultError::parse(context, e))?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(value).map_err(|e| KeyVaultError::parse(context, e)),
        Value::Object(_) => serde_json::from_value(value)
            .map(|item| vec![item])
            .map_err(|e| KeyVaultError::parse(context, e)),
        other => Err(KeyVaultError::parse(
            context,
            format!("expected JSON array or object, got {other}"),
        )),
    }
}

pub(crate) fn decode_one<T: DeserializeOwned>(
    output: &str,
    context: &str,
) -> Result<T, KeyVaultError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(KeyVaultError::parse(context, "empty output"));
    }
    serde_json::from_str(trimmed).map_err(|e| KeyVaultError::parse(context, e))
}

/// Seconds precision with a `Z` suffix, as `az` expects for `--expires`.
pub(crate) fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `k=v` pairs, sorted so command lines are stable.
pub(crate) fn tag_pairs(tags: &Tags) -> Vec<String> {
    let mut pairs: Vec<String> = tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs
}

pub(crate) fn bool_arg(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Optional lifecycle arguments shared by create/set calls.
pub(crate) fn with_lifecycle(
    command: AzCommand,
    expires: Option<DateTime<Utc>>,
    not_before: Option<DateTime<Utc>>,
) -> AzCommand {
    command
        .opt_arg("--expires", expires.map(format_date))
        .opt_arg("--not-before", not_before.map(format_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn decode_list_accepts_array_object_and_empty() {
        let items: Vec<Item> = decode_list(r#"[{"name":"a"},{"name":"b"}]"#, "list").unwrap();
        assert_eq!(items.len(), 2);

        let items: Vec<Item> = decode_list(r#"{"name":"solo"}"#, "list").unwrap();
        assert_eq!(items, vec![Item { name: "solo".into() }]);

        let items: Vec<Item> = decode_list("  \n", "list").unwrap();
        assert!(items.is_empty());

        let err = decode_list::<Item>("42", "list").unwrap_err();
        assert_eq!(err.code(), "parse_error");
    }

    #[test]
    fn decode_one_rejects_empty_and_garbage() {
        assert!(decode_one::<Item>("", "show").is_err());
        let err = decode_one::<Item>("WARNING: not json", "show").unwrap_err();
        assert!(err.message().starts_with("show:"));
    }

    #[test]
    fn dates_and_tags_render_stably() {
        let at = Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap();
        assert_eq!(format_date(at), "2025-06-30T23:59:59Z");

        let tags = HashMap::from([
            ("owner".to_string(), "ops".to_string()),
            ("env".to_string(), "prod".to_string()),
        ]);
        assert_eq!(tag_pairs(&tags), vec!["env=prod", "owner=ops"]);
    }
}

//! Device-code prompts printed by `az login --use-device-code`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Lifetime of a device code when the CLI does not say otherwise.
pub const DEFAULT_DEVICE_CODE_EXPIRES_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCodeInfo {
    pub user_code: String,
    pub verification_url: String,
    /// The CLI's own instruction line.
    pub message: String,
    pub expires_in: u64,
    /// Poll interval in seconds.
    pub interval: u64,
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)enter the code\s+([A-Z0-9][A-Z0-9-]{3,})").expect("device code pattern")
    })
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://[^\s'\x22]+").expect("url pattern"))
}

/// Extract the user code and verification URL from one line of CLI output.
///
/// Returns `None` unless both are present.
pub fn parse_device_code(line: &str) -> Option<DeviceCodeInfo> {
    parse_device_code_with_interval(line, 5)
}

pub(crate) fn parse_device_code_with_interval(line: &str, interval: u64) -> Option<DeviceCodeInfo> {
    let code = code_pattern().captures(line)?.get(1)?.as_str();
    let url = url_pattern().find(line)?.as_str();
    let url = url.trim_end_matches(['.', ',', ';', ')']);

    let message = line
        .trim()
        .trim_start_matches("WARNING:")
        .trim()
        .to_string();

    Some(DeviceCodeInfo {
        user_code: code.to_string(),
        verification_url: url.to_string(),
        message,
        expires_in: DEFAULT_DEVICE_CODE_EXPIRES_SECS,
        interval,
    })
}

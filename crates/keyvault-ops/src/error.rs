use crate::validation::ValidationError;
use az_cli_runner::CommandResult;
use thiserror::Error;

/// Error taxonomy for Key Vault operations.
#[derive(Debug, Error)]
pub enum KeyVaultError {
    #[error("Azure CLI is not installed: {message}")]
    CliNotInstalled { message: String },

    #[error("Not logged in to Azure: {message}")]
    NotLoggedIn { message: String },

    #[error("Access denied: {message}")]
    Forbidden { message: String },

    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Azure CLI command timed out: {message}")]
    Timeout { message: String },

    #[error("Azure CLI command failed: {message}")]
    CommandFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("Failed to parse Azure CLI output: {message}")]
    ParseError { message: String },
}

impl KeyVaultError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CliNotInstalled { .. } => "cli_not_installed",
            Self::NotLoggedIn { .. } => "not_logged_in",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::InvalidParams { .. } => "invalid_params",
            Self::Validation(_) => "validation",
            Self::Timeout { .. } => "timeout",
            Self::CommandFailed { .. } => "command_failed",
            Self::ParseError { .. } => "parse_error",
        }
    }

    /// Underlying text: CLI stderr or the validation message.
    pub fn message(&self) -> &str {
        match self {
            Self::CliNotInstalled { message }
            | Self::NotLoggedIn { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::InvalidParams { message }
            | Self::Timeout { message }
            | Self::CommandFailed { message, .. }
            | Self::ParseError { message } => message,
            Self::Validation(err) => &err.message,
        }
    }

    pub(crate) fn parse(context: &str, err: impl std::fmt::Display) -> Self {
        Self::ParseError {
            message: format!("{context}: {err}"),
        }
    }
}

/// Map a failed [`CommandResult`] onto the taxonomy by loose text matching.
pub fn classify_failure(result: &CommandResult) -> KeyVaultError {
    let message = result.error_text();

    if result.timed_out {
        return KeyVaultError::Timeout { message };
    }

    let text = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if has(&["is not installed", "command not found"]) {
        KeyVaultError::CliNotInstalled { message }
    } else if has(&[
        "az login",
        "not logged in",
        "no subscription found",
        "interactive authentication is needed",
        "token has expired",
        "refresh token has expired",
        "aadsts",
    ]) {
        KeyVaultError::NotLoggedIn { message }
    } else if has(&[
        "forbidden",
        "authorizationfailed",
        "does not have authorization",
        "caller is not authorized",
        "not authorized",
        "does not have secrets",
        "does not have keys",
        "does not have certificates",
        "access denied",
    ]) {
        KeyVaultError::Forbidden { message }
    } else if has(&[
        "deleted but recoverable",
        "already exists",
        "conflict",
        "currently being deleted",
        "is in a deleted state",
    ]) {
        KeyVaultError::Conflict { message }
    } else if has(&["not found", "notfound", "could not be found", "does not exist"]) {
        KeyVaultError::NotFound { message }
    } else if has(&[
        "unrecognized arguments",
        "the following arguments are required",
        "invalid value",
        "invalid choice",
        "expected one argument",
        "badparameter",
        "bad request",
    ]) {
        KeyVaultError::InvalidParams { message }
    } else {
        KeyVaultError::CommandFailed {
            message,
            exit_code: result.exit_code,
        }
    }
}

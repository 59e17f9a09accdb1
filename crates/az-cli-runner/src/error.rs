use thiserror::Error;

/// Failures that prevent a command from starting at all.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Azure CLI is not installed (looked for `{executable}`)")]
    CliNotInstalled { executable: String },

    #[error("failed to start az: {message}")]
    Spawn { message: String },
}

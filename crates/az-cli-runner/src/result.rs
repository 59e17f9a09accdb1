use serde::de::DeserializeOwned;

/// Outcome of one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub success: bool,
    /// Trimmed stdout.
    pub output: String,
    /// Trimmed stderr, or a synthesized message when the process never ran.
    pub error: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl CommandResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            success: false,
            error: error.into(),
            exit_code,
            ..Default::default()
        }
    }

    pub fn timeout(command: &str, secs: u64) -> Self {
        Self {
            success: false,
            error: format!("command timed out after {secs}s: {command}"),
            timed_out: true,
            ..Default::default()
        }
    }

    /// Best human-readable explanation of a failure: stderr, then stdout,
    /// then a generic message carrying the exit code.
    pub fn error_text(&self) -> String {
        if !self.error.trim().is_empty() {
            self.error.clone()
        } else if !self.output.trim().is_empty() {
            self.output.clone()
        } else {
            format!("az command failed with exit code {:?}", self.exit_code)
        }
    }

    /// Decode stdout as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.output)
    }
}

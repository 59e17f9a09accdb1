use crate::{AzCommand, CommandResult, RunnerError, TIMEOUT_LONG_SECS};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

/// One line of output from a streaming command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(line) | OutputLine::Stderr(line) => line,
        }
    }
}

/// A long-running command whose output is consumed line by line.
///
/// Dropping the handle (or calling [`SpawnedCommand::cancel`]) kills the
/// child process.
pub struct SpawnedCommand {
    lines: mpsc::Receiver<OutputLine>,
    cancel: Option<oneshot::Sender<()>>,
    exit: Option<oneshot::Receiver<Option<i32>>>,
}

impl SpawnedCommand {
    /// Assemble a handle from its channels. Runners other than
    /// [`AzCliRunner`] use this to provide the same streaming surface.
    pub fn new(
        lines: mpsc::Receiver<OutputLine>,
        cancel: oneshot::Sender<()>,
        exit: oneshot::Receiver<Option<i32>>,
    ) -> Self {
        Self {
            lines,
            cancel: Some(cancel),
            exit: Some(exit),
        }
    }

    /// Next stdout or stderr line; `None` once both streams are closed.
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    /// Request termination. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the process to exit and return its exit code. Later calls
    /// return `None`.
    pub async fn wait(&mut self) -> Option<i32> {
        match self.exit.take() {
            Some(rx) => rx.await.ok().flatten(),
            None => None,
        }
    }
}

impl Drop for SpawnedCommand {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Execution seam between the services and the `az` process.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. `None` uses the runner's default timeout.
    async fn run(&self, command: &AzCommand, timeout: Option<Duration>) -> CommandResult;

    /// Start a command and stream its output.
    async fn spawn(&self, command: &AzCommand) -> Result<SpawnedCommand, RunnerError>;
}

/// Runs the real Azure CLI.
#[derive(Debug, Clone)]
pub struct AzCliRunner {
    executable: String,
    default_timeout: Duration,
}

impl Default for AzCliRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl AzCliRunner {
    pub fn new() -> Self {
        Self {
            executable: resolve_az_executable(),
            default_timeout: Duration::from_secs(TIMEOUT_LONG_SECS),
        }
    }

    /// Use a specific binary instead of searching for `az`.
    pub fn with_executable(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::new()
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    fn command(&self, command: &AzCommand) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(command.argv());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        apply_non_interactive_env(&mut cmd);
        cmd
    }
}

#[async_trait]
impl CommandRunner for AzCliRunner {
    async fn run(&self, command: &AzCommand, limit: Option<Duration>) -> CommandResult {
        let limit = limit.unwrap_or(self.default_timeout);
        let shown = command.redacted_line();
        debug!(command = %shown, timeout_secs = limit.as_secs(), "running az");

        let mut cmd = self.command(command);
        // Batch output only; spawned logins need the CLI's warnings for the device code.
        cmd.env("AZURE_CORE_ONLY_SHOW_ERRORS", "true");
        let output = match timeout(limit, cmd.output()).await {
            Err(_) => {
                warn!(command = %shown, timeout_secs = limit.as_secs(), "az command timed out");
                return CommandResult::timeout(&shown, limit.as_secs());
            }
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(executable = %self.executable, "az executable not found");
                return CommandResult::failure(
                    RunnerError::CliNotInstalled {
                        executable: self.executable.clone(),
                    }
                    .to_string(),
                    None,
                );
            }
            Ok(Err(err)) => {
                warn!(command = %shown, error = %err, "failed to execute az");
                return CommandResult::failure(format!("failed to execute az command: {err}"), None);
            }
            Ok(Ok(output)) => output,
        };

        let result = CommandResult {
            success: output.status.success(),
            output: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            error: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
            timed_out: false,
        };

        if result.success {
            debug!(command = %shown, bytes = result.output.len(), "az command succeeded");
        } else {
            debug!(
                command = %shown,
                exit_code = ?result.exit_code,
                stderr = %first_line(&result.error),
                "az command failed"
            );
        }
        result
    }

    async fn spawn(&self, command: &AzCommand) -> Result<SpawnedCommand, RunnerError> {
        let shown = command.redacted_line();
        debug!(command = %shown, "spawning az");

        let mut child = self.command(command).spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RunnerError::CliNotInstalled {
                    executable: self.executable.clone(),
                }
            } else {
                RunnerError::Spawn {
                    message: err.to_string(),
                }
            }
        })?;

        let (line_tx, line_rx) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, line_tx.clone(), OutputLine::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, line_tx, OutputLine::Stderr);
        }

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = cancel_rx => None,
            };
            let code = match exited {
                Some(status) => status.ok().and_then(|s| s.code()),
                None => {
                    if let Err(err) = child.kill().await {
                        debug!(error = %err, "spawned az already exited");
                    }
                    debug!(command = %shown, "spawned az cancelled");
                    None
                }
            };
            let _ = exit_tx.send(code);
        });

        Ok(SpawnedCommand::new(line_rx, cancel_tx, exit_rx))
    }
}

fn forward_lines<R>(reader: R, tx: mpsc::Sender<OutputLine>, wrap: fn(String) -> OutputLine)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(wrap(line)).await.is_err() {
                break;
            }
        }
    });
}

fn apply_non_interactive_env(cmd: &mut Command) {
    cmd.env("AZURE_CORE_NO_COLOR", "true");
    cmd.env("AZURE_CORE_COLLECT_TELEMETRY", "false");
    cmd.env("AZURE_CORE_SURVEY_MESSAGE", "false");
}

fn resolve_az_executable() -> String {
    if let Ok(path) = std::env::var("AZ_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    for candidate in ["/opt/homebrew/bin/az", "/usr/local/bin/az", "/usr/bin/az"] {
        if Path::new(candidate).exists() {
            return candidate.to_string();
        }
    }

    if cfg!(windows) {
        "az.cmd".to_string()
    } else {
        "az".to_string()
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::OutputFormat;

    // `/bin/sh -c <script> -o json` runs the script and ignores the
    // trailing output flag (it lands in $0/$1).
    fn sh() -> AzCliRunner {
        AzCliRunner::with_executable("/bin/sh")
    }

    fn script(body: &str) -> AzCommand {
        AzCommand::new(["-c", body]).output(OutputFormat::Json)
    }

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let result = sh().run(&script("echo '[1,2]'"), None).await;
        assert!(result.success);
        assert_eq!(result.output, "[1,2]");
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let result = sh()
            .run(&script("echo 'ERROR: (Forbidden) denied' >&2; exit 3"), None)
            .await;
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.error, "ERROR: (Forbidden) denied");
    }

    #[tokio::test]
    async fn timeout_kills_and_flags_result() {
        let result = sh()
            .run(&script("sleep 5"), Some(Duration::from_millis(100)))
            .await;
        assert!(!result.success);
        assert!(result.timed_out);
        assert!(result.exit_code.is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_a_failed_result() {
        let runner = AzCliRunner::with_executable("/nonexistent/definitely-not-az");
        let result = runner.run(&AzCommand::new(["version"]), None).await;
        assert!(!result.success);
        assert!(result.error.contains("not installed"));

        let spawned = runner.spawn(&AzCommand::new(["login"])).await;
        assert!(matches!(spawned, Err(RunnerError::CliNotInstalled { .. })));
    }

    #[tokio::test]
    async fn spawn_streams_lines_and_reports_exit() {
        let mut spawned = sh()
            .spawn(&script("echo first; echo second >&2; echo third"))
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some(line) = spawned.next_line().await {
            seen.push(line);
        }

        assert!(seen.contains(&OutputLine::Stdout("first".into())));
        assert!(seen.contains(&OutputLine::Stderr("second".into())));
        assert!(seen.contains(&OutputLine::Stdout("third".into())));
        assert_eq!(spawned.wait().await, Some(0));
    }

    #[tokio::test]
    async fn cancel_terminates_spawned_process() {
        let mut spawned = sh().spawn(&script("sleep 30")).await.unwrap();
        spawned.cancel();
        let code = tokio::time::timeout(Duration::from_secs(5), spawned.wait())
            .await
            .unwrap();
        assert_eq!(code, None);
    }

    #[test]
    fn picks_az_path_env_when_set() {
        std::env::set_var("AZ_PATH", "/custom/az");
        let resolved = resolve_az_executable();
        std::env::remove_var("AZ_PATH");
        assert_eq!(resolved, "/custom/az");
    }
}

//! `az login --use-device-code`, for hosts without a usable browser.

use super::azure_cli::{session_from_account, AzureCliAuth};
use crate::device_code::{parse_device_code_with_interval, DeviceCodeInfo};
use crate::{AuthError, AuthProvider, AuthResult, Session};
use akv_config_and_utils::AuthStrategy;
use akv_storage::SessionStore;
use async_trait::async_trait;
use az_cli_runner::{AzCommand, CommandResult, CommandRunner, OutputFormat, OutputLine};
use keyvault_ops::{classify_failure, AccountService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub const DEVICE_CODE_SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Stderr lines kept for the error when `az login` fails.
const STDERR_TAIL: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCodeConfig {
    /// Delay between `az account show` polls.
    pub poll_interval: Duration,
    /// Polls before giving up.
    pub max_attempts: u32,
}

impl Default for DeviceCodeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_attempts: 180,
        }
    }
}

pub struct DeviceCodeAuth {
    runner: Arc<dyn CommandRunner>,
    account: AccountService,
    tenant: Option<String>,
    config: DeviceCodeConfig,
    codes: broadcast::Sender<DeviceCodeInfo>,
    // Shares probe, logout and validation with the interactive CLI flow.
    cli: AzureCliAuth,
}

impl DeviceCodeAuth {
    pub fn new(runner: Arc<dyn CommandRunner>, tenant: Option<String>) -> Self {
        Self::with_config(runner, tenant, DeviceCodeConfig::default())
    }

    pub fn with_config(
        runner: Arc<dyn CommandRunner>,
        tenant: Option<String>,
        config: DeviceCodeConfig,
    ) -> Self {
        let (codes, _) = broadcast::channel(8);
        Self {
            account: AccountService::new(runner.clone()),
            cli: AzureCliAuth::new(runner.clone(), tenant.clone()),
            runner,
            tenant,
            config,
            codes,
        }
    }

    /// Receives each device code as soon as the CLI prints it.
    pub fn device_codes(&self) -> broadcast::Receiver<DeviceCodeInfo> {
        self.codes.subscribe()
    }
}

/// Error for an `az login` that exited non-zero, classified from its stderr.
fn login_failure(stderr: &[String], exit_code: i32) -> keyvault_ops::KeyVaultError {
    let text = if stderr.is_empty() {
        format!("az login exited with code {exit_code}")
    } else {
        stderr.join("\n")
    };
    classify_failure(&CommandResult::failure(text, Some(exit_code)))
}

#[async_trait]
impl AuthProvider for DeviceCodeAuth {
    fn strategy(&self) -> AuthStrategy {
        AuthStrategy::DeviceCode
    }

    async fn probe(&self, store: &SessionStore) -> AuthResult<Option<Session>> {
        self.cli.probe(store).await
    }

    async fn login(&self) -> AuthResult<Session> {
        let cmd = AzCommand::new(["login"])
            .flag("--use-device-code")
            .opt_arg("--tenant", self.tenant.as_deref())
            .output(OutputFormat::None);

        let mut child = self
            .runner
            .spawn(&cmd)
            .await
            .map_err(|e| AuthError::Spawn(e.to_string()))?;
        info!(tenant = ?self.tenant, "device code login started");

        let interval_secs = self.config.poll_interval.as_secs().max(1);
        let mut published = false;
        let mut output_open = true;
        let mut stderr: Vec<String> = Vec::new();

        for attempt in 1..=self.config.max_attempts {
            let tick = tokio::time::sleep(self.config.poll_interval);
            tokio::pin!(tick);

            loop {
                tokio::select! {
                    _ = &mut tick => break,
                    line = child.next_line(), if output_open => match line {
                        Some(line) => {
                            if let OutputLine::Stderr(text) = &line {
                                if stderr.len() == STDERR_TAIL {
                                    stderr.remove(0);
                                }
                                stderr.push(text.clone());
                            }
                            if !published {
                                if let Some(info) = parse_device_code_with_interval(line.text(), interval_secs) {
                                    info!(url = %info.verification_url, "device code issued");
                                    // No subscribers is fine; the CLI prints the code too.
                                    let _ = self.codes.send(info);
                                    published = true;
                                }
                            }
                        }
                        None => {
                            output_open = false;
                            if let Some(code) = child.wait().await.filter(|code| *code != 0) {
                                let err = login_failure(&stderr, code);
                                warn!(exit_code = code, code = err.code(), "device code login failed");
                                return Err(err.into());
                            }
                        }
                    },
                }
            }

            match self.account.show().await {
                Ok(account) => {
                    child.cancel();
                    info!(attempt, "device code login completed");
                    return Ok(session_from_account(&self.account, account).await);
                }
                Err(err) => debug!(attempt, code = err.code(), "device code login still pending"),
            }
        }

        child.cancel();
        warn!(
            attempts = self.config.max_attempts,
            "device code login timed out"
        );
        Err(AuthError::Timeout)
    }

    async fn logout(&self, session: Option<&Session>) -> AuthResult<()> {
        self.cli.logout(session).await
    }

    async fn validate(&self, session: &Session) -> AuthResult<bool> {
        self.cli.validate(session).await
    }

    async fn refresh(&self, session: &Session) -> AuthResult<Session> {
        self.cli.refresh(session).await
    }

    fn supports_refresh(&self) -> bool {
        false
    }

    fn session_check_interval(&self) -> Duration {
        DEVICE_CODE_SESSION_CHECK_INTERVAL
    }
}

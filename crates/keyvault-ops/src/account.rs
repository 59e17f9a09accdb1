use crate::exec::{decode_list, decode_one, run_checked};
use crate::types::{AccountInfo, RoleAssignment, SignedInUser};
use crate::validation::ValidationError;
use crate::KeyVaultError;
use az_cli_runner::{AzCommand, CommandRunner, OutputFormat, TIMEOUT_SHORT_SECS};
use std::sync::Arc;
use tracing::info;

/// Subscription and identity lookups: `az account`, `az ad signed-in-user`,
/// `az role assignment`.
#[derive(Clone)]
pub struct AccountService {
    runner: Arc<dyn CommandRunner>,
}

impl AccountService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Active subscription. Fails with `NotLoggedIn` when there is no login.
    pub async fn show(&self) -> Result<AccountInfo, KeyVaultError> {
        let cmd = AzCommand::new(["account", "show"]);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        decode_one(&result.output, "failed to parse az account show output")
    }

    pub async fn list(&self) -> Result<Vec<AccountInfo>, KeyVaultError> {
        let cmd = AzCommand::new(["account", "list"]);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        decode_list(&result.output, "failed to parse az account list output")
    }

    /// Switch the active subscription by id or name.
    pub async fn set_subscription(&self, subscription: &str) -> Result<(), KeyVaultError> {
        if subscription.trim().is_empty() {
            return Err(ValidationError::new("subscription", "Subscription is required").into());
        }

        let cmd = AzCommand::new(["account", "set"])
            .arg("--subscription", subscription)
            .output(OutputFormat::None);
        run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        info!(subscription = %subscription, "active subscription changed");
        Ok(())
    }

    pub async fn signed_in_user(&self) -> Result<SignedInUser, KeyVaultError> {
        let cmd = AzCommand::new(["ad", "signed-in-user", "show"]);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        decode_one(&result.output, "failed to parse az ad signed-in-user show output")
    }

    /// Assignments for `assignee`, limited to `scope` or across all scopes.
    pub async fn role_assignments(
        &self,
        assignee: &str,
        scope: Option<&str>,
    ) -> Result<Vec<RoleAssignment>, KeyVaultError> {
        if assignee.trim().is_empty() {
            return Err(ValidationError::new("assignee", "Assignee is required").into());
        }

        let mut cmd = AzCommand::new(["role", "assignment", "list"]).arg("--assignee", assignee);
        cmd = match scope {
            Some(scope) => cmd.arg("--scope", scope),
            None => cmd.flag("--all"),
        };
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        decode_list(&result.output, "failed to parse az role assignment list output")
    }
}

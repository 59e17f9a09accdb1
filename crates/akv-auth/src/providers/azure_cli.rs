//! Sign-in through the Azure CLI's own login.

use crate::{AuthError, AuthProvider, AuthResult, Session};
use akv_config_and_utils::AuthStrategy;
use akv_storage::{SessionStore, UserInfo};
use async_trait::async_trait;
use az_cli_runner::{AzCommand, CommandRunner, OutputFormat};
use chrono::Utc;
use keyvault_ops::{classify_failure, AccountInfo, AccountService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CLI_SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Browser login can take a while; the CLI waits for the user.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub struct AzureCliAuth {
    runner: Arc<dyn CommandRunner>,
    account: AccountService,
    tenant: Option<String>,
}

impl AzureCliAuth {
    pub fn new(runner: Arc<dyn CommandRunner>, tenant: Option<String>) -> Self {
        Self {
            account: AccountService::new(runner.clone()),
            runner,
            tenant,
        }
    }
}

/// Describe the CLI's signed-in identity.
///
/// The id is the directory object id when `az ad signed-in-user show`
/// works (users only), otherwise the account's `user.name`. Roles are
/// best effort.
pub(crate) async fn session_from_account(
    account_service: &AccountService,
    account: AccountInfo,
) -> Session {
    let account_user = account
        .user
        .as_ref()
        .map(|u| u.name.clone())
        .unwrap_or_default();

    let signed_in = match account_service.signed_in_user().await {
        Ok(user) => Some(user),
        Err(err) => {
            debug!(error = %err, "signed-in user lookup failed, using account user name");
            None
        }
    };

    let id = signed_in
        .as_ref()
        .map(|u| u.id.clone())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| account_user.clone());
    let email = signed_in
        .as_ref()
        .and_then(|u| u.mail.clone().or_else(|| u.user_principal_name.clone()))
        .unwrap_or_else(|| account_user.clone());
    let name = signed_in
        .as_ref()
        .and_then(|u| u.display_name.clone())
        .unwrap_or_else(|| account_user.clone());

    let scope = format!("/subscriptions/{}", account.id);
    let mut roles: Vec<String> = match account_service.role_assignments(&id, Some(&scope)).await {
        Ok(assignments) => assignments
            .into_iter()
            .map(|a| a.role_definition_name)
            .collect(),
        Err(err) => {
            debug!(error = %err, "role assignment lookup failed");
            Vec::new()
        }
    };
    roles.sort();
    roles.dedup();

    Session::new(
        UserInfo {
            id,
            email,
            name,
            tenant_id: Some(account.tenant_id),
            roles,
            last_login: Utc::now(),
        },
        None,
    )
}

#[async_trait]
impl AuthProvider for AzureCliAuth {
    fn strategy(&self) -> AuthStrategy {
        AuthStrategy::AzureCli
    }

    async fn probe(&self, _store: &SessionStore) -> AuthResult<Option<Session>> {
        match self.account.show().await {
            Ok(account) => Ok(Some(session_from_account(&self.account, account).await)),
            Err(err) => {
                let err = AuthError::from(err);
                if err.is_not_logged_in() {
                    debug!("no existing Azure CLI login");
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn login(&self) -> AuthResult<Session> {
        let cmd = AzCommand::new(["login"])
            .opt_arg("--tenant", self.tenant.as_deref())
            .output(OutputFormat::None);
        info!(tenant = ?self.tenant, "starting az login");

        let result = self.runner.run(&cmd, Some(LOGIN_TIMEOUT)).await;
        if !result.success {
            let err = classify_failure(&result);
            warn!(code = err.code(), "az login failed");
            return Err(err.into());
        }

        let account = self.account.show().await?;
        Ok(session_from_account(&self.account, account).await)
    }

    async fn logout(&self, _session: Option<&Session>) -> AuthResult<()> {
        let cmd = AzCommand::new(["logout"]).output(OutputFormat::None);
        let result = self.runner.run(&cmd, None).await;
        if result.success {
            Ok(())
        } else {
            Err(classify_failure(&result).into())
        }
    }

    async fn validate(&self, _session: &Session) -> AuthResult<bool> {
        match self.account.show().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = AuthError::from(err);
                if err.is_not_logged_in() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn refresh(&self, _session: &Session) -> AuthResult<Session> {
        let account = self.account.show().await?;
        Ok(session_from_account(&self.account, account).await)
    }

    fn supports_refresh(&self) -> bool {
        false
    }

    fn session_check_interval(&self) -> Duration {
        CLI_SESSION_CHECK_INTERVAL
    }
}

use crate::exec::{bool_arg, decode_list, decode_one, run_checked, tag_pairs, with_lifecycle};
use crate::types::{AttributesUpdate, DeletedSecretInfo, SecretInfo, SecretSetInput};
use crate::validation::{
    validate_activation_window, validate_object_name, validate_secret_value, validate_tags,
    validate_vault_name, ValidationError,
};
use crate::wire::{map_deleted_secret, map_secret, AzSecret};
use crate::KeyVaultError;
use az_cli_runner::{AzCommand, CommandRunner, OutputFormat, TIMEOUT_LONG_SECS, TIMEOUT_SHORT_SECS};
use std::sync::Arc;
use tracing::info;

/// `az keyvault secret ...`. Secret values are passed as masked arguments
/// and never logged.
#[derive(Clone)]
pub struct SecretService {
    runner: Arc<dyn CommandRunner>,
}

fn target(vault: &str, name: &str) -> Result<(), ValidationError> {
    validate_vault_name(vault)?;
    validate_object_name(name)
}

fn secret_command(action: &str, vault: &str) -> AzCommand {
    AzCommand::new(["keyvault", "secret", action]).arg("--vault-name", vault)
}

impl SecretService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn list(&self, vault: &str) -> Result<Vec<SecretInfo>, KeyVaultError> {
        validate_vault_name(vault)?;
        let result = run_checked(
            self.runner.as_ref(),
            secret_command("list", vault),
            TIMEOUT_SHORT_SECS,
        )
        .await?;
        let raw: Vec<AzSecret> =
            decode_list(&result.output, "failed to parse az keyvault secret list output")?;
        Ok(raw.into_iter().map(map_secret).collect())
    }

    pub async fn list_versions(&self, vault: &str, name: &str) -> Result<Vec<SecretInfo>, KeyVaultError> {
        target(vault, name)?;
        let cmd = secret_command("list-versions", vault).arg("--name", name);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        let raw: Vec<AzSecret> = decode_list(
            &result.output,
            "failed to parse az keyvault secret list-versions output",
        )?;
        Ok(raw.into_iter().map(map_secret).collect())
    }

    /// Latest version unless `version` is given. The result carries the value.
    pub async fn show(
        &self,
        vault: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<SecretInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = secret_command("show", vault)
            .arg("--name", name)
            .opt_arg("--version", version);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        let raw: AzSecret =
            decode_one(&result.output, "failed to parse az keyvault secret show output")?;
        Ok(map_secret(raw))
    }

    /// Creates the secret or adds a new version.
    pub async fn set(&self, input: &SecretSetInput) -> Result<SecretInfo, KeyVaultError> {
        target(&input.vault, &input.name)?;
        validate_secret_value(&input.value)?;
        validate_tags(&input.tags)?;
        validate_activation_window(input.not_before, input.expires)?;

        let mut cmd = secret_command("set", &input.vault)
            .arg("--name", &input.name)
            .sensitive_arg("--value", &input.value)
            .opt_arg("--content-type", input.content_type.as_deref());
        if let Some(enabled) = input.enabled {
            cmd = cmd.arg("--disabled", bool_arg(!enabled));
        }
        let cmd = with_lifecycle(cmd, input.expires, input.not_before)
            .args_list("--tags", tag_pairs(&input.tags));

        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let mut secret = map_secret(decode_one(
            &result.output,
            "failed to parse az keyvault secret set output",
        )?);
        secret.value = None;
        info!(vault = %input.vault, secret = %secret.name, version = ?secret.version, "secret set");
        Ok(secret)
    }

    pub async fn set_attributes(
        &self,
        vault: &str,
        name: &str,
        update: &AttributesUpdate,
    ) -> Result<SecretInfo, KeyVaultError> {
        target(vault, name)?;
        if update.key_ops.is_some() {
            return Err(ValidationError::new("key_ops", "Secrets have no key operations").into());
        }
        if let Some(tags) = &update.tags {
            validate_tags(tags)?;
        }
        validate_activation_window(update.not_before, update.expires)?;
        if update.enabled.is_none()
            && update.expires.is_none()
            && update.not_before.is_none()
            && update.content_type.is_none()
            && update.tags.is_none()
        {
            return Err(ValidationError::new("attributes", "Nothing to update").into());
        }

        let cmd = secret_command("set-attributes", vault)
            .arg("--name", name)
            .opt_arg("--version", update.version.as_deref())
            .opt_arg("--enabled", update.enabled.map(bool_arg))
            .opt_arg("--content-type", update.content_type.as_deref());
        let cmd = with_lifecycle(cmd, update.expires, update.not_before).args_list(
            "--tags",
            update.tags.as_ref().map(tag_pairs).unwrap_or_default(),
        );

        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let secret = map_secret(decode_one(
            &result.output,
            "failed to parse az keyvault secret set-attributes output",
        )?);
        info!(vault = %vault, secret = %name, "secret attributes updated");
        Ok(secret)
    }

    /// Soft-delete. The secret stays recoverable until purged.
    pub async fn delete(&self, vault: &str, name: &str) -> Result<DeletedSecretInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = secret_command("delete", vault).arg("--name", name);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let deleted = map_deleted_secret(decode_one(
            &result.output,
            "failed to parse az keyvault secret delete output",
        )?);
        info!(vault = %vault, secret = %name, "secret deleted");
        Ok(deleted)
    }

    pub async fn recover(&self, vault: &str, name: &str) -> Result<SecretInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = secret_command("recover", vault).arg("--name", name);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let secret = map_secret(decode_one(
            &result.output,
            "failed to parse az keyvault secret recover output",
        )?);
        info!(vault = %vault, secret = %name, "secret recovered");
        Ok(secret)
    }

    /// Permanently removes a soft-deleted secret.
    pub async fn purge(&self, vault: &str, name: &str) -> Result<(), KeyVaultError> {
        target(vault, name)?;
        let cmd = secret_command("purge", vault)
            .arg("--name", name)
            .output(OutputFormat::None);
        run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        info!(vault = %vault, secret = %name, "secret purged");
        Ok(())
    }

    pub async fn list_deleted(&self, vault: &str) -> Result<Vec<DeletedSecretInfo>, KeyVaultError> {
        validate_vault_name(vault)?;
        let result = run_checked(
            self.runner.as_ref(),
            secret_command("list-deleted", vault),
            TIMEOUT_SHORT_SECS,
        )
        .await?;
        let raw: Vec<AzSecret> = decode_list(
            &result.output,
            "failed to parse az keyvault secret list-deleted output",
        )?;
        Ok(raw.into_iter().map(map_deleted_secret).collect())
    }
}

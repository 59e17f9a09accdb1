use crate::exec::{bool_arg, decode_list, decode_one, run_checked, tag_pairs, with_lifecycle};
use crate::types::{AttributesUpdate, DeletedKeyInfo, KeyCreateInput, KeyInfo};
use crate::validation::{
    validate_activation_window, validate_object_name, validate_rsa_key_size, validate_tags,
    validate_vault_name, ValidationError,
};
use crate::wire::{map_deleted_key, map_key, AzKey};
use crate::KeyVaultError;
use az_cli_runner::{AzCommand, CommandRunner, OutputFormat, TIMEOUT_LONG_SECS, TIMEOUT_SHORT_SECS};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RSA_SIZE: u32 = 2048;

/// `az keyvault key ...`.
#[derive(Clone)]
pub struct KeyService {
    runner: Arc<dyn CommandRunner>,
}

fn target(vault: &str, name: &str) -> Result<(), ValidationError> {
    validate_vault_name(vault)?;
    validate_object_name(name)
}

fn key_command(action: &str, vault: &str) -> AzCommand {
    AzCommand::new(["keyvault", "key", action]).arg("--vault-name", vault)
}

fn file_arg(file: &Path) -> Result<String, ValidationError> {
    let text = file.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ValidationError::new("file", "File path is required"));
    }
    Ok(text.into_owned())
}

impl KeyService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn list(&self, vault: &str) -> Result<Vec<KeyInfo>, KeyVaultError> {
        validate_vault_name(vault)?;
        let result = run_checked(
            self.runner.as_ref(),
            key_command("list", vault),
            TIMEOUT_SHORT_SECS,
        )
        .await?;
        let raw: Vec<AzKey> =
            decode_list(&result.output, "failed to parse az keyvault key list output")?;
        Ok(raw.into_iter().map(map_key).collect())
    }

    pub async fn list_versions(&self, vault: &str, name: &str) -> Result<Vec<KeyInfo>, KeyVaultError> {
        target(vault, name)?;
        let cmd = key_command("list-versions", vault).arg("--name", name);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        let raw: Vec<AzKey> = decode_list(
            &result.output,
            "failed to parse az keyvault key list-versions output",
        )?;
        Ok(raw.into_iter().map(map_key).collect())
    }

    pub async fn show(
        &self,
        vault: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<KeyInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = key_command("show", vault)
            .arg("--name", name)
            .opt_arg("--version", version);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        let raw: AzKey = decode_one(&result.output, "failed to parse az keyvault key show output")?;
        Ok(map_key(raw))
    }

    /// RSA keys take a size (default 2048); EC keys take a curve.
    pub async fn create(&self, input: &KeyCreateInput) -> Result<KeyInfo, KeyVaultError> {
        target(&input.vault, &input.name)?;
        validate_tags(&input.tags)?;
        validate_activation_window(input.not_before, input.expires)?;

        let kty = input.key_type;
        let size = if kty.is_rsa() {
            let size = input.size.unwrap_or(DEFAULT_RSA_SIZE);
            validate_rsa_key_size(size)?;
            Some(size)
        } else if input.size.is_some() {
            return Err(ValidationError::new(
                "size",
                format!("Key size only applies to RSA keys, not {}", kty.as_str()),
            )
            .into());
        } else {
            None
        };
        if input.curve.is_some() && !kty.is_ec() {
            return Err(ValidationError::new(
                "curve",
                format!("Curve only applies to EC keys, not {}", kty.as_str()),
            )
            .into());
        }

        let mut cmd = key_command("create", &input.vault)
            .arg("--name", &input.name)
            .arg("--kty", kty.as_str())
            .opt_arg("--size", size.map(|s| s.to_string()))
            .opt_arg("--curve", input.curve.map(|c| c.as_str()))
            .args_list("--ops", input.ops.iter().map(String::as_str));
        if let Some(enabled) = input.enabled {
            cmd = cmd.arg("--disabled", bool_arg(!enabled));
        }
        let cmd = with_lifecycle(cmd, input.expires, input.not_before)
            .args_list("--tags", tag_pairs(&input.tags));

        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let key = map_key(decode_one(
            &result.output,
            "failed to parse az keyvault key create output",
        )?);
        info!(vault = %input.vault, key = %key.name, kty = kty.as_str(), "key created");
        Ok(key)
    }

    pub async fn set_attributes(
        &self,
        vault: &str,
        name: &str,
        update: &AttributesUpdate,
    ) -> Result<KeyInfo, KeyVaultError> {
        target(vault, name)?;
        if update.content_type.is_some() {
            return Err(ValidationError::new("content_type", "Keys have no content type").into());
        }
        if let Some(tags) = &update.tags {
            validate_tags(tags)?;
        }
        validate_activation_window(update.not_before, update.expires)?;
        if update.enabled.is_none()
            && update.expires.is_none()
            && update.not_before.is_none()
            && update.key_ops.is_none()
            && update.tags.is_none()
        {
            return Err(ValidationError::new("attributes", "Nothing to update").into());
        }

        let cmd = key_command("set-attributes", vault)
            .arg("--name", name)
            .opt_arg("--version", update.version.as_deref())
            .opt_arg("--enabled", update.enabled.map(bool_arg))
            .args_list("--ops", update.key_ops.clone().unwrap_or_default());
        let cmd = with_lifecycle(cmd, update.expires, update.not_before).args_list(
            "--tags",
            update.tags.as_ref().map(tag_pairs).unwrap_or_default(),
        );

        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let key = map_key(decode_one(
            &result.output,
            "failed to parse az keyvault key set-attributes output",
        )?);
        info!(vault = %vault, key = %name, "key attributes updated");
        Ok(key)
    }

    pub async fn delete(&self, vault: &str, name: &str) -> Result<DeletedKeyInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = key_command("delete", vault).arg("--name", name);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let deleted = map_deleted_key(decode_one(
            &result.output,
            "failed to parse az keyvault key delete output",
        )?);
        info!(vault = %vault, key = %name, "key deleted");
        Ok(deleted)
    }

    pub async fn recover(&self, vault: &str, name: &str) -> Result<KeyInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = key_command("recover", vault).arg("--name", name);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let key = map_key(decode_one(
            &result.output,
            "failed to parse az keyvault key recover output",
        )?);
        info!(vault = %vault, key = %name, "key recovered");
        Ok(key)
    }

    pub async fn purge(&self, vault: &str, name: &str) -> Result<(), KeyVaultError> {
        target(vault, name)?;
        let cmd = key_command("purge", vault)
            .arg("--name", name)
            .output(OutputFormat::None);
        run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        info!(vault = %vault, key = %name, "key purged");
        Ok(())
    }

    pub async fn list_deleted(&self, vault: &str) -> Result<Vec<DeletedKeyInfo>, KeyVaultError> {
        validate_vault_name(vault)?;
        let result = run_checked(
            self.runner.as_ref(),
            key_command("list-deleted", vault),
            TIMEOUT_SHORT_SECS,
        )
        .await?;
        let raw: Vec<AzKey> = decode_list(
            &result.output,
            "failed to parse az keyvault key list-deleted output",
        )?;
        Ok(raw.into_iter().map(map_deleted_key).collect())
    }

    /// Writes a protected backup blob to `file`. `az` refuses to overwrite.
    pub async fn backup(&self, vault: &str, name: &str, file: &Path) -> Result<(), KeyVaultError> {
        target(vault, name)?;
        let path = file_arg(file)?;
        let cmd = key_command("backup", vault)
            .arg("--name", name)
            .arg("--file", path)
            .output(OutputFormat::None);
        run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        info!(vault = %vault, key = %name, file = %file.display(), "key backed up");
        Ok(())
    }

    /// Restores a key from a backup blob into `vault`.
    pub async fn restore(&self, vault: &str, file: &Path) -> Result<KeyInfo, KeyVaultError> {
        validate_vault_name(vault)?;
        if !file.is_file() {
            return Err(ValidationError::new(
                "file",
                format!("Backup file not found: {}", file.display()),
            )
            .into());
        }

        let cmd = key_command("restore", vault).arg("--file", file_arg(file)?);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let key = map_key(decode_one(
            &result.output,
            "failed to parse az keyvault key restore output",
        )?);
        info!(vault = %vault, key = %key.name, "key restored");
        Ok(key)
    }
}

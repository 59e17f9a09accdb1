use crate::exec::{bool_arg, decode_list, decode_one, run_checked, tag_pairs};
use crate::types::{VaultCreateInput, VaultInfo};
use crate::validation::{
    validate_location, validate_resource_group, validate_retention_days, validate_tags,
    validate_vault_name,
};
use crate::wire::{map_vault, AzVault};
use crate::KeyVaultError;
use az_cli_runner::{AzCommand, CommandRunner, OutputFormat, TIMEOUT_LONG_SECS, TIMEOUT_SHORT_SECS};
use std::sync::Arc;
use tracing::info;

/// `az keyvault list|show|create|delete`.
#[derive(Clone)]
pub struct VaultService {
    runner: Arc<dyn CommandRunner>,
}

impl VaultService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn list(&self, resource_group: Option<&str>) -> Result<Vec<VaultInfo>, KeyVaultError> {
        if let Some(rg) = resource_group {
            validate_resource_group(rg)?;
        }

        let cmd = AzCommand::new(["keyvault", "list"]).opt_arg("--resource-group", resource_group);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        let raw: Vec<AzVault> = decode_list(&result.output, "failed to parse az keyvault list output")?;
        Ok(raw.into_iter().map(map_vault).collect())
    }

    pub async fn show(
        &self,
        name: &str,
        resource_group: Option<&str>,
    ) -> Result<VaultInfo, KeyVaultError> {
        validate_vault_name(name)?;
        if let Some(rg) = resource_group {
            validate_resource_group(rg)?;
        }

        let cmd = AzCommand::new(["keyvault", "show"])
            .arg("--name", name)
            .opt_arg("--resource-group", resource_group);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        let raw: AzVault = decode_one(&result.output, "failed to parse az keyvault show output")?;
        Ok(map_vault(raw))
    }

    pub async fn create(&self, input: &VaultCreateInput) -> Result<VaultInfo, KeyVaultError> {
        validate_vault_name(&input.name)?;
        validate_resource_group(&input.resource_group)?;
        validate_location(&input.location)?;
        validate_tags(&input.tags)?;
        if let Some(days) = input.retention_days {
            validate_retention_days(days)?;
        }

        let mut cmd = AzCommand::new(["keyvault", "create"])
            .arg("--name", &input.name)
            .arg("--resource-group", &input.resource_group)
            .arg("--location", &input.location)
            .arg("--sku", input.sku.as_str())
            .arg(
                "--enable-rbac-authorization",
                bool_arg(input.enable_rbac_authorization),
            )
            .opt_arg("--retention-days", input.retention_days.map(|d| d.to_string()))
            .args_list("--tags", tag_pairs(&input.tags));
        if input.enable_purge_protection {
            cmd = cmd.arg("--enable-purge-protection", "true");
        }

        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let vault = map_vault(decode_one(
            &result.output,
            "failed to parse az keyvault create output",
        )?);
        info!(vault = %vault.name, resource_group = %input.resource_group, "vault created");
        Ok(vault)
    }

    /// Soft-deletes the vault.
    pub async fn delete(&self, name: &str, resource_group: Option<&str>) -> Result<(), KeyVaultError> {
        validate_vault_name(name)?;
        if let Some(rg) = resource_group {
            validate_resource_group(rg)?;
        }

        let cmd = AzCommand::new(["keyvault", "delete"])
            .arg("--name", name)
            .opt_arg("--resource-group", resource_group)
            .output(OutputFormat::None);
        run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        info!(vault = %name, "vault deleted");
        Ok(())
    }
}

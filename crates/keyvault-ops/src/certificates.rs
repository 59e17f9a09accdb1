use crate::exec::{bool_arg, decode_list, decode_one, run_checked, tag_pairs};
use crate::types::{
    AttributesUpdate, CertificateCreateInput, CertificateEncoding, CertificateImportInput,
    CertificateInfo, CertificateOperation, DeletedCertificateInfo,
};
use crate::validation::{validate_object_name, validate_tags, validate_vault_name, ValidationError};
use crate::wire::{map_certificate, map_deleted_certificate, AzCertificate};
use crate::KeyVaultError;
use az_cli_runner::{AzCommand, CommandRunner, OutputFormat, TIMEOUT_LONG_SECS, TIMEOUT_SHORT_SECS};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// `az keyvault certificate ...`.
#[derive(Clone)]
pub struct CertificateService {
    runner: Arc<dyn CommandRunner>,
}

fn target(vault: &str, name: &str) -> Result<(), ValidationError> {
    validate_vault_name(vault)?;
    validate_object_name(name)
}

fn cert_command(action: &str, vault: &str) -> AzCommand {
    AzCommand::new(["keyvault", "certificate", action]).arg("--vault-name", vault)
}

impl CertificateService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn list(&self, vault: &str) -> Result<Vec<CertificateInfo>, KeyVaultError> {
        validate_vault_name(vault)?;
        let result = run_checked(
            self.runner.as_ref(),
            cert_command("list", vault),
            TIMEOUT_SHORT_SECS,
        )
        .await?;
        let raw: Vec<AzCertificate> = decode_list(
            &result.output,
            "failed to parse az keyvault certificate list output",
        )?;
        Ok(raw.into_iter().map(map_certificate).collect())
    }

    pub async fn show(
        &self,
        vault: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<CertificateInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = cert_command("show", vault)
            .arg("--name", name)
            .opt_arg("--version", version);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        let raw: AzCertificate = decode_one(
            &result.output,
            "failed to parse az keyvault certificate show output",
        )?;
        Ok(map_certificate(raw))
    }

    /// Self-signed default policy as reported by the CLI.
    pub async fn get_default_policy(&self) -> Result<Value, KeyVaultError> {
        let cmd = AzCommand::new(["keyvault", "certificate", "get-default-policy"]);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_SHORT_SECS).await?;
        decode_one(
            &result.output,
            "failed to parse az keyvault certificate get-default-policy output",
        )
    }

    /// Starts issuance. Without a policy the default self-signed policy is
    /// fetched first.
    pub async fn create(
        &self,
        input: &CertificateCreateInput,
    ) -> Result<CertificateOperation, KeyVaultError> {
        target(&input.vault, &input.name)?;
        validate_tags(&input.tags)?;

        let policy = match &input.policy {
            Some(policy @ Value::Object(_)) => policy.clone(),
            Some(_) => {
                return Err(
                    ValidationError::new("policy", "Certificate policy must be a JSON object")
                        .into(),
                )
            }
            None => {
                debug!(certificate = %input.name, "no policy given, using default policy");
                self.get_default_policy().await?
            }
        };

        let mut cmd = cert_command("create", &input.vault)
            .arg("--name", &input.name)
            .arg("--policy", policy.to_string());
        if let Some(enabled) = input.enabled {
            cmd = cmd.arg("--disabled", bool_arg(!enabled));
        }
        let cmd = cmd.args_list("--tags", tag_pairs(&input.tags));

        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let operation: CertificateOperation = decode_one(
            &result.output,
            "failed to parse az keyvault certificate create output",
        )?;
        info!(
            vault = %input.vault,
            certificate = %input.name,
            status = ?operation.status,
            "certificate creation started"
        );
        Ok(operation)
    }

    /// Only `enabled` and `tags` can change on a certificate.
    pub async fn set_attributes(
        &self,
        vault: &str,
        name: &str,
        update: &AttributesUpdate,
    ) -> Result<CertificateInfo, KeyVaultError> {
        target(vault, name)?;
        if update.expires.is_some() || update.not_before.is_some() {
            return Err(ValidationError::new(
                "attributes",
                "Certificate validity comes from its policy and cannot be edited",
            )
            .into());
        }
        if update.content_type.is_some() || update.key_ops.is_some() {
            return Err(ValidationError::new(
                "attributes",
                "Only enabled and tags can be changed on a certificate",
            )
            .into());
        }
        if let Some(tags) = &update.tags {
            validate_tags(tags)?;
        }
        if update.enabled.is_none() && update.tags.is_none() {
            return Err(ValidationError::new("attributes", "Nothing to update").into());
        }

        let cmd = cert_command("set-attributes", vault)
            .arg("--name", name)
            .opt_arg("--version", update.version.as_deref())
            .opt_arg("--enabled", update.enabled.map(bool_arg))
            .args_list(
                "--tags",
                update.tags.as_ref().map(tag_pairs).unwrap_or_default(),
            );

        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let cert = map_certificate(decode_one(
            &result.output,
            "failed to parse az keyvault certificate set-attributes output",
        )?);
        info!(vault = %vault, certificate = %name, "certificate attributes updated");
        Ok(cert)
    }

    pub async fn delete(
        &self,
        vault: &str,
        name: &str,
    ) -> Result<DeletedCertificateInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = cert_command("delete", vault).arg("--name", name);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let deleted = map_deleted_certificate(decode_one(
            &result.output,
            "failed to parse az keyvault certificate delete output",
        )?);
        info!(vault = %vault, certificate = %name, "certificate deleted");
        Ok(deleted)
    }

    /// Imports a PEM or PFX bundle. The password is masked in logs.
    pub async fn import(
        &self,
        input: &CertificateImportInput,
    ) -> Result<CertificateInfo, KeyVaultError> {
        target(&input.vault, &input.name)?;
        validate_tags(&input.tags)?;
        if !input.file.is_file() {
            return Err(ValidationError::new(
                "file",
                format!("Certificate file not found: {}", input.file.display()),
            )
            .into());
        }

        let mut cmd = cert_command("import", &input.vault)
            .arg("--name", &input.name)
            .arg("--file", input.file.to_string_lossy());
        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            cmd = cmd.sensitive_arg("--password", password);
        }
        if let Some(enabled) = input.enabled {
            cmd = cmd.arg("--disabled", bool_arg(!enabled));
        }
        let cmd = cmd.args_list("--tags", tag_pairs(&input.tags));

        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let cert = map_certificate(decode_one(
            &result.output,
            "failed to parse az keyvault certificate import output",
        )?);
        info!(vault = %input.vault, certificate = %cert.name, "certificate imported");
        Ok(cert)
    }

    /// Writes the public certificate to `file`.
    pub async fn download(
        &self,
        vault: &str,
        name: &str,
        file: &Path,
        encoding: CertificateEncoding,
        version: Option<&str>,
    ) -> Result<(), KeyVaultError> {
        target(vault, name)?;
        if file.as_os_str().is_empty() {
            return Err(ValidationError::new("file", "File path is required").into());
        }

        let cmd = cert_command("download", vault)
            .arg("--name", name)
            .arg("--file", file.to_string_lossy())
            .arg("--encoding", encoding.as_str())
            .opt_arg("--version", version)
            .output(OutputFormat::None);
        run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        info!(vault = %vault, certificate = %name, file = %file.display(), "certificate downloaded");
        Ok(())
    }

    pub async fn list_deleted(
        &self,
        vault: &str,
    ) -> Result<Vec<DeletedCertificateInfo>, KeyVaultError> {
        validate_vault_name(vault)?;
        let result = run_checked(
            self.runner.as_ref(),
            cert_command("list-deleted", vault),
            TIMEOUT_SHORT_SECS,
        )
        .await?;
        let raw: Vec<AzCertificate> = decode_list(
            &result.output,
            "failed to parse az keyvault certificate list-deleted output",
        )?;
        Ok(raw.into_iter().map(map_deleted_certificate).collect())
    }

    pub async fn recover(&self, vault: &str, name: &str) -> Result<CertificateInfo, KeyVaultError> {
        target(vault, name)?;
        let cmd = cert_command("recover", vault).arg("--name", name);
        let result = run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        let cert = map_certificate(decode_one(
            &result.output,
            "failed to parse az keyvault certificate recover output",
        )?);
        info!(vault = %vault, certificate = %name, "certificate recovered");
        Ok(cert)
    }

    pub async fn purge(&self, vault: &str, name: &str) -> Result<(), KeyVaultError> {
        target(vault, name)?;
        let cmd = cert_command("purge", vault)
            .arg("--name", name)
            .output(OutputFormat::None);
        run_checked(self.runner.as_ref(), cmd, TIMEOUT_LONG_SECS).await?;
        info!(vault = %vault, certificate = %name, "certificate purged");
        Ok(())
    }
}

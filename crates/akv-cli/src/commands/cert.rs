//! Certificate commands.

use super::{format_date, format_tags, print_attributes, tag_map};
use crate::context::Context;
use crate::output::{or_dash, print_heading, print_json, print_list, print_row, print_success, OutputFormat};
use crate::CertCommands;
use anyhow::{Context as _, Result};
use keyvault_ops::{
    AttributesUpdate, CertificateCreateInput, CertificateImportInput, CertificateInfo,
};
use std::path::Path;

pub async fn cert(ctx: &Context, command: CertCommands, format: &OutputFormat) -> Result<()> {
    let certs = &ctx.client.certificates;
    match command {
        CertCommands::List { vault } => {
            let vault = ctx.vault(vault.vault)?;
            let items = certs.list(&vault).await?;
            print_list(
                &items,
                &["NAME", "SUBJECT", "STATUS", "EXPIRES"],
                |c| {
                    vec![
                        c.name.clone(),
                        or_dash(c.subject.as_deref()),
                        c.status().to_string(),
                        format_date(c.attributes.expires),
                    ]
                },
                "No certificates in this vault.",
                format,
            );
        }
        CertCommands::Show {
            name,
            version,
            vault,
        } => {
            let vault = ctx.vault(vault.vault)?;
            let item = certs.show(&vault, &name, version.as_deref()).await?;
            print_certificate(&item, format);
        }
        CertCommands::Create {
            name,
            policy,
            disabled,
            tags,
            vault,
        } => {
            let input = CertificateCreateInput {
                vault: ctx.vault(vault.vault)?,
                name,
                policy: policy.as_deref().map(read_policy).transpose()?,
                enabled: disabled.then_some(false),
                tags: tags.into_iter().collect(),
            };
            let operation = certs.create(&input).await?;
            match format {
                OutputFormat::Json => print_json(&operation),
                OutputFormat::Text => {
                    print_success(
                        &format!("Certificate '{}' creation started", input.name),
                        format,
                    );
                    print_row("Status", &or_dash(operation.status.as_deref()));
                    if let Some(details) = &operation.status_details {
                        print_row("Details", details);
                    }
                }
            }
        }
        CertCommands::Update {
            name,
            version,
            enabled,
            tags,
            vault,
        } => {
            let vault = ctx.vault(vault.vault)?;
            let update = AttributesUpdate {
                version,
                enabled,
                tags: tag_map(tags),
                ..AttributesUpdate::default()
            };
            let item = certs.set_attributes(&vault, &name, &update).await?;
            print_certificate(&item, format);
        }
        CertCommands::Delete { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            let deleted = certs.delete(&vault, &name).await?;
            match format {
                OutputFormat::Json => print_json(&deleted),
                OutputFormat::Text => {
                    print_success(&format!("Certificate '{}' deleted", name), format);
                    print_row(
                        "Purge date",
                        &format_date(deleted.deletion.scheduled_purge_date),
                    );
                }
            }
        }
        CertCommands::Import {
            name,
            file,
            password,
            disabled,
            tags,
            vault,
        } => {
            let input = CertificateImportInput {
                vault: ctx.vault(vault.vault)?,
                name,
                file,
                password,
                enabled: disabled.then_some(false),
                tags: tags.into_iter().collect(),
            };
            let item = certs.import(&input).await?;
            print_certificate(&item, format);
        }
        CertCommands::Download {
            name,
            file,
            encoding,
            version,
            vault,
        } => {
            let vault = ctx.vault(vault.vault)?;
            certs
                .download(&vault, &name, &file, encoding.into(), version.as_deref())
                .await?;
            print_success(
                &format!("Certificate '{}' saved to {}", name, file.display()),
                format,
            );
        }
        CertCommands::Policy => {
            let policy = certs.get_default_policy().await?;
            print_json(&policy);
        }
        CertCommands::Deleted { vault } => {
            let vault = ctx.vault(vault.vault)?;
            let items = certs.list_deleted(&vault).await?;
            print_list(
                &items,
                &["NAME", "DELETED", "PURGE DATE"],
                |d| {
                    vec![
                        d.certificate.name.clone(),
                        format_date(d.deletion.deleted_date),
                        format_date(d.deletion.scheduled_purge_date),
                    ]
                },
                "No deleted certificates.",
                format,
            );
        }
        CertCommands::Recover { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            certs.recover(&vault, &name).await?;
            print_success(&format!("Certificate '{}' recovered", name), format);
        }
        CertCommands::Purge { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            certs.purge(&vault, &name).await?;
            print_success(&format!("Certificate '{}' permanently deleted", name), format);
        }
    }
    Ok(())
}

fn read_policy(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("policy file {} is not valid JSON", path.display()))
}

fn print_certificate(item: &CertificateInfo, format: &OutputFormat) {
    if matches!(format, OutputFormat::Json) {
        print_json(item);
        return;
    }

    print_heading(&item.name);
    print_row("Version", &or_dash(item.version.as_deref()));
    print_row("Subject", &or_dash(item.subject.as_deref()));
    print_row("Thumbprint", &or_dash(item.thumbprint.as_deref()));
    print_row("Content type", &or_dash(item.content_type.as_deref()));
    print_attributes(&item.attributes);
    print_row("Tags", &format_tags(item.tags.as_ref()));
}

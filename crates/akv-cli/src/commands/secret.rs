//! Secret commands.

use super::{format_date, format_tags, print_attributes, tag_map};
use crate::context::Context;
use crate::output::{or_dash, print_heading, print_json, print_list, print_row, print_success, OutputFormat};
use crate::SecretCommands;
use anyhow::{Context as _, Result};
use keyvault_ops::{AttributesUpdate, DeletedSecretInfo, SecretInfo, SecretSetInput};
use std::io::Read;

pub async fn secret(ctx: &Context, command: SecretCommands, format: &OutputFormat) -> Result<()> {
    let secrets = &ctx.client.secrets;
    match command {
        SecretCommands::List { vault } => {
            let vault = ctx.vault(vault.vault)?;
            let items = secrets.list(&vault).await?;
            print_secrets(&items, "No secrets in this vault.", format);
        }
        SecretCommands::Versions { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            let items = secrets.list_versions(&vault, &name).await?;
            print_list(
                &items,
                &["VERSION", "STATUS", "UPDATED", "EXPIRES"],
                |s| {
                    vec![
                        or_dash(s.version.as_deref()),
                        s.status().to_string(),
                        format_date(s.attributes.updated),
                        format_date(s.attributes.expires),
                    ]
                },
                "No versions found.",
                format,
            );
        }
        SecretCommands::Show {
            name,
            version,
            vault,
        } => {
            let vault = ctx.vault(vault.vault)?;
            let item = secrets.show(&vault, &name, version.as_deref()).await?;
            print_secret(&item, format);
        }
        SecretCommands::Set {
            name,
            value,
            content_type,
            disabled,
            lifecycle,
            vault,
        } => {
            let value = match value {
                Some(value) => value,
                None => read_stdin_value()?,
            };
            let input = SecretSetInput {
                vault: ctx.vault(vault.vault)?,
                name,
                value,
                content_type,
                enabled: disabled.then_some(false),
                expires: lifecycle.expires,
                not_before: lifecycle.not_before,
                tags: lifecycle.tags.into_iter().collect(),
            };
            let item = secrets.set(&input).await?;
            print_secret(&item, format);
        }
        SecretCommands::Update {
            name,
            version,
            enabled,
            content_type,
            lifecycle,
            vault,
        } => {
            let vault = ctx.vault(vault.vault)?;
            let update = AttributesUpdate {
                version,
                enabled,
                expires: lifecycle.expires,
                not_before: lifecycle.not_before,
                content_type,
                key_ops: None,
                tags: tag_map(lifecycle.tags),
            };
            let item = secrets.set_attributes(&vault, &name, &update).await?;
            print_secret(&item, format);
        }
        SecretCommands::Delete { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            let deleted = secrets.delete(&vault, &name).await?;
            match format {
                OutputFormat::Json => print_json(&deleted),
                OutputFormat::Text => {
                    print_success(&format!("Secret '{}' deleted", name), format);
                    print_row(
                        "Purge date",
                        &format_date(deleted.deletion.scheduled_purge_date),
                    );
                }
            }
        }
        SecretCommands::Recover { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            secrets.recover(&vault, &name).await?;
            print_success(&format!("Secret '{}' recovered", name), format);
        }
        SecretCommands::Purge { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            secrets.purge(&vault, &name).await?;
            print_success(&format!("Secret '{}' permanently deleted", name), format);
        }
        SecretCommands::Deleted { vault } => {
            let vault = ctx.vault(vault.vault)?;
            let items = secrets.list_deleted(&vault).await?;
            print_deleted(&items, format);
        }
    }
    Ok(())
}

/// Value piped on stdin, without the trailing newline.
fn read_stdin_value() -> Result<String> {
    let mut value = String::new();
    std::io::stdin()
        .read_to_string(&mut value)
        .context("failed to read secret value from stdin")?;
    let value = value.strip_suffix('\n').unwrap_or(&value);
    let value = value.strip_suffix('\r').unwrap_or(value);
    Ok(value.to_string())
}

fn print_secrets(items: &[SecretInfo], empty: &str, format: &OutputFormat) {
    print_list(
        items,
        &["NAME", "STATUS", "CONTENT TYPE", "UPDATED", "EXPIRES"],
        |s| {
            vec![
                s.name.clone(),
                s.status().to_string(),
                or_dash(s.content_type.as_deref()),
                format_date(s.attributes.updated),
                format_date(s.attributes.expires),
            ]
        },
        empty,
        format,
    );
}

fn print_secret(item: &SecretInfo, format: &OutputFormat) {
    if matches!(format, OutputFormat::Json) {
        print_json(item);
        return;
    }

    print_heading(&item.name);
    print_row("Version", &or_dash(item.version.as_deref()));
    print_row("Content type", &or_dash(item.content_type.as_deref()));
    print_attributes(&item.attributes);
    print_row("Tags", &format_tags(item.tags.as_ref()));
    if item.managed {
        print_row("Managed", "yes (certificate-backed)");
    }
    if let Some(value) = &item.value {
        print_row("Value", value);
    }
}

fn print_deleted(items: &[DeletedSecretInfo], format: &OutputFormat) {
    print_list(
        items,
        &["NAME", "DELETED", "PURGE DATE"],
        |d| {
            vec![
                d.secret.name.clone(),
                format_date(d.deletion.deleted_date),
                format_date(d.deletion.scheduled_purge_date),
            ]
        },
        "No deleted secrets.",
        format,
    );
}

//! Key commands.

use super::{format_date, format_tags, print_attributes, tag_map};
use crate::context::Context;
use crate::output::{or_dash, print_heading, print_json, print_list, print_row, print_success, OutputFormat};
use crate::KeyCommands;
use anyhow::Result;
use keyvault_ops::{AttributesUpdate, KeyCreateInput, KeyInfo};

pub async fn key(ctx: &Context, command: KeyCommands, format: &OutputFormat) -> Result<()> {
    let keys = &ctx.client.keys;
    match command {
        KeyCommands::List { vault } => {
            let vault = ctx.vault(vault.vault)?;
            let items = keys.list(&vault).await?;
            print_keys(&items, "No keys in this vault.", format);
        }
        KeyCommands::Versions { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            let items = keys.list_versions(&vault, &name).await?;
            print_list(
                &items,
                &["VERSION", "STATUS", "UPDATED", "EXPIRES"],
                |k| {
                    vec![
                        or_dash(k.version.as_deref()),
                        k.status().to_string(),
                        format_date(k.attributes.updated),
                        format_date(k.attributes.expires),
                    ]
                },
                "No versions found.",
                format,
            );
        }
        KeyCommands::Show {
            name,
            version,
            vault,
        } => {
            let vault = ctx.vault(vault.vault)?;
            let item = keys.show(&vault, &name, version.as_deref()).await?;
            print_key(&item, format);
        }
        KeyCommands::Create {
            name,
            key_type,
            size,
            curve,
            ops,
            disabled,
            lifecycle,
            vault,
        } => {
            let input = KeyCreateInput {
                vault: ctx.vault(vault.vault)?,
                name,
                key_type: key_type.into(),
                size,
                curve: curve.map(Into::into),
                ops,
                enabled: disabled.then_some(false),
                expires: lifecycle.expires,
                not_before: lifecycle.not_before,
                tags: lifecycle.tags.into_iter().collect(),
            };
            let item = keys.create(&input).await?;
            print_key(&item, format);
        }
        KeyCommands::Update {
            name,
            version,
            enabled,
            ops,
            lifecycle,
            vault,
        } => {
            let vault = ctx.vault(vault.vault)?;
            let update = AttributesUpdate {
                version,
                enabled,
                expires: lifecycle.expires,
                not_before: lifecycle.not_before,
                content_type: None,
                key_ops: (!ops.is_empty()).then_some(ops),
                tags: tag_map(lifecycle.tags),
            };
            let item = keys.set_attributes(&vault, &name, &update).await?;
            print_key(&item, format);
        }
        KeyCommands::Delete { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            let deleted = keys.delete(&vault, &name).await?;
            match format {
                OutputFormat::Json => print_json(&deleted),
                OutputFormat::Text => {
                    print_success(&format!("Key '{}' deleted", name), format);
                    print_row(
                        "Purge date",
                        &format_date(deleted.deletion.scheduled_purge_date),
                    );
                }
            }
        }
        KeyCommands::Recover { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            keys.recover(&vault, &name).await?;
            print_success(&format!("Key '{}' recovered", name), format);
        }
        KeyCommands::Purge { name, vault } => {
            let vault = ctx.vault(vault.vault)?;
            keys.purge(&vault, &name).await?;
            print_success(&format!("Key '{}' permanently deleted", name), format);
        }
        KeyCommands::Deleted { vault } => {
            let vault = ctx.vault(vault.vault)?;
            let items = keys.list_deleted(&vault).await?;
            print_list(
                &items,
                &["NAME", "TYPE", "DELETED", "PURGE DATE"],
                |d| {
                    vec![
                        d.key.name.clone(),
                        or_dash(d.key.key_type.as_deref()),
                        format_date(d.deletion.deleted_date),
                        format_date(d.deletion.scheduled_purge_date),
                    ]
                },
                "No deleted keys.",
                format,
            );
        }
        KeyCommands::Backup { name, file, vault } => {
            let vault = ctx.vault(vault.vault)?;
            keys.backup(&vault, &name, &file).await?;
            print_success(
                &format!("Key '{}' backed up to {}", name, file.display()),
                format,
            );
        }
        KeyCommands::Restore { file, vault } => {
            let vault = ctx.vault(vault.vault)?;
            let item = keys.restore(&vault, &file).await?;
            print_key(&item, format);
        }
    }
    Ok(())
}

fn print_keys(items: &[KeyInfo], empty: &str, format: &OutputFormat) {
    print_list(
        items,
        &["NAME", "TYPE", "SIZE/CURVE", "STATUS", "EXPIRES"],
        |k| {
            vec![
                k.name.clone(),
                or_dash(k.key_type.as_deref()),
                k.key_size
                    .map(|s| s.to_string())
                    .or_else(|| k.curve.clone())
                    .unwrap_or_else(|| "-".to_string()),
                k.status().to_string(),
                format_date(k.attributes.expires),
            ]
        },
        empty,
        format,
    );
}

fn print_key(item: &KeyInfo, format: &OutputFormat) {
    if matches!(format, OutputFormat::Json) {
        print_json(item);
        return;
    }

    print_heading(&item.name);
    print_row("Version", &or_dash(item.version.as_deref()));
    print_row("Type", &or_dash(item.key_type.as_deref()));
    if let Some(size) = item.key_size {
        print_row("Size", &size.to_string());
    }
    if let Some(curve) = &item.curve {
        print_row("Curve", curve);
    }
    print_row(
        "Operations",
        &if item.key_ops.is_empty() {
            "-".to_string()
        } else {
            item.key_ops.join(", ")
        },
    );
    print_attributes(&item.attributes);
    print_row("Tags", &format_tags(item.tags.as_ref()));
    if item.managed {
        print_row("Managed", "yes (certificate-backed)");
    }
}

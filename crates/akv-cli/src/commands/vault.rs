//! Vault commands.

use super::format_tags;
use crate::context::Context;
use crate::output::{or_dash, print_heading, print_json, print_list, print_row, print_success, OutputFormat};
use anyhow::Result;
use keyvault_ops::{VaultCreateInput, VaultInfo};

pub async fn vault_list(
    ctx: &Context,
    resource_group: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let vaults = ctx.client.vaults.list(resource_group).await?;
    print_list(
        &vaults,
        &["NAME", "RESOURCE GROUP", "LOCATION", "SKU"],
        |v| {
            vec![
                v.name.clone(),
                or_dash(v.resource_group.as_deref()),
                or_dash(v.location.as_deref()),
                or_dash(v.sku.as_deref()),
            ]
        },
        "No key vaults found.",
        format,
    );
    Ok(())
}

pub async fn vault_show(
    ctx: &Context,
    name: &str,
    resource_group: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let vault = ctx.client.vaults.show(name, resource_group).await?;
    print_vault(&vault, format);
    Ok(())
}

pub async fn vault_create(
    ctx: &Context,
    input: &VaultCreateInput,
    format: &OutputFormat,
) -> Result<()> {
    if matches!(format, OutputFormat::Text) {
        println!("Creating vault '{}' in {}...", input.name, input.location);
    }
    let vault = ctx.client.vaults.create(input).await?;
    print_vault(&vault, format);
    Ok(())
}

pub async fn vault_delete(
    ctx: &Context,
    name: &str,
    resource_group: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.client.vaults.delete(name, resource_group).await?;
    print_success(&format!("Vault '{}' deleted", name), format);
    Ok(())
}

fn print_vault(vault: &VaultInfo, format: &OutputFormat) {
    if matches!(format, OutputFormat::Json) {
        print_json(vault);
        return;
    }

    let flag = |value: Option<bool>| match value {
        Some(true) => "yes".to_string(),
        Some(false) => "no".to_string(),
        None => "-".to_string(),
    };

    print_heading(&vault.name);
    print_row("URI", &or_dash(vault.vault_uri.as_deref()));
    print_row("Resource group", &or_dash(vault.resource_group.as_deref()));
    print_row("Location", &or_dash(vault.location.as_deref()));
    print_row("SKU", &or_dash(vault.sku.as_deref()));
    print_row("Tenant", &or_dash(vault.tenant_id.as_deref()));
    print_row("Soft delete", &flag(vault.soft_delete_enabled));
    print_row("Retention days", &or_dash(vault.soft_delete_retention_days));
    print_row("Purge protection", &flag(vault.purge_protection_enabled));
    print_row("RBAC", &flag(vault.rbac_authorization_enabled));
    print_row("Tags", &format_tags(vault.tags.as_ref()));
}

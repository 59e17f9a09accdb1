//! Subscription commands.

use crate::context::Context;
use crate::output::{or_dash, print_list, print_success, OutputFormat};
use anyhow::Result;

pub async fn account_list(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let accounts = ctx.client.account.list().await?;
    print_list(
        &accounts,
        &["", "NAME", "SUBSCRIPTION ID", "TENANT", "STATE"],
        |a| {
            vec![
                if a.is_default { "*".into() } else { String::new() },
                a.name.clone(),
                a.id.clone(),
                a.tenant_id.clone(),
                or_dash(a.state.as_deref()),
            ]
        },
        "No subscriptions. Run 'akv login' first.",
        format,
    );
    Ok(())
}

pub async fn account_set(ctx: &Context, subscription: &str, format: &OutputFormat) -> Result<()> {
    ctx.client.account.set_subscription(subscription).await?;
    print_success(&format!("Active subscription set to '{}'", subscription), format);
    Ok(())
}

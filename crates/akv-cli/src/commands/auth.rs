//! Sign-in commands.

use crate::context::Context;
use crate::output::{self, print_heading, print_json, print_row, print_success, OutputFormat};
use akv_config_and_utils::AuthStrategy;
use anyhow::Result;
use serde_json::json;

pub async fn login(
    mut ctx: Context,
    strategy: Option<AuthStrategy>,
    format: &OutputFormat,
) -> Result<()> {
    if let Some(strategy) = strategy {
        ctx.config.auth_strategy = strategy;
    }

    let auth = ctx.auth().await?;
    let result = if auth.is_authenticated() {
        auth.current_session()
            .ok_or_else(|| anyhow::anyhow!("session missing after restore"))
    } else {
        if matches!(format, OutputFormat::Text) {
            println!("Signing in with {}...", auth.strategy());
        }
        auth.login().await.map_err(anyhow::Error::from)
    };
    auth.dispose();
    let session = result?;

    match format {
        OutputFormat::Text => {
            print_success(
                &format!("Signed in as {} ({})", session.user.name, session.user.email),
                format,
            );
            if let Some(tenant) = &session.user.tenant_id {
                print_row("Tenant", tenant);
            }
        }
        OutputFormat::Json => print_json(&json!({
            "status": "success",
            "strategy": ctx.config.auth_strategy.to_string(),
            "user": session.user,
        })),
    }
    Ok(())
}

pub async fn logout(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let auth = ctx.auth().await?;
    let result = auth.logout().await;
    auth.dispose();
    result?;
    print_success("Signed out", format);
    Ok(())
}

pub async fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let auth = ctx.auth().await?;
    let state = auth.state();
    let user = auth.current_user();
    let expires_at = auth.current_tokens().map(|t| t.expires_at);
    auth.dispose();

    match format {
        OutputFormat::Json => print_json(&json!({
            "state": state,
            "strategy": ctx.config.auth_strategy.to_string(),
            "user": user,
            "expires_at": expires_at,
        })),
        OutputFormat::Text => {
            print_heading("Authentication");
            print_row("State", state.as_str());
            print_row("Strategy", &ctx.config.auth_strategy.to_string());
            match user {
                Some(user) => {
                    print_row("User", &user.name);
                    print_row("Email", &user.email);
                    print_row("Id", &user.id);
                    print_row("Tenant", &output::or_dash(user.tenant_id.as_deref()));
                    if !user.roles.is_empty() {
                        print_row("Roles", &user.roles.join(", "));
                    }
                    print_row(
                        "Signed in",
                        &user.last_login.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                    );
                    if let Some(expires_at) = expires_at {
                        print_row(
                            "Token expires",
                            &expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                        );
                    }
                }
                None => println!("\nNot signed in. Run 'akv login'."),
            }
        }
    }
    Ok(())
}

//! AKV Manager CLI - manage Azure Key Vault through the Azure CLI.

mod commands;
mod context;
mod output;

use akv_config_and_utils::AuthStrategy;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::{parse_datetime, parse_strategy, parse_tag};
use context::Context;
use keyvault_ops::{CertificateEncoding, KeyCurve, KeyType, KeyVaultError, VaultSku};
use std::path::PathBuf;

/// AKV Manager - browse and manage Azure Key Vault secrets, keys and certificates.
#[derive(Parser)]
#[command(name = "akv")]
#[command(about = "Azure Key Vault manager built on the Azure CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AKV_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        /// Authentication strategy (azure_cli, device_code, oauth, mock)
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<AuthStrategy>,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Show authentication status
    Status,

    /// Subscriptions
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Key vaults
    Vault {
        #[command(subcommand)]
        command: VaultCommands,
    },

    /// Secrets
    Secret {
        #[command(subcommand)]
        command: SecretCommands,
    },

    /// Keys
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Certificates
    Cert {
        #[command(subcommand)]
        command: CertCommands,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// List subscriptions
    List,
    /// Select the active subscription
    Set {
        /// Subscription name or id
        subscription: String,
    },
}

#[derive(Subcommand)]
enum VaultCommands {
    /// List vaults
    List {
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
    },
    /// Show vault details
    Show {
        name: String,
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
    },
    /// Create a vault
    Create {
        name: String,
        #[arg(short = 'g', long)]
        resource_group: String,
        #[arg(short, long)]
        location: String,
        #[arg(long, value_enum, default_value = "standard")]
        sku: SkuArg,
        /// Use Azure RBAC for data-plane authorization
        #[arg(long)]
        rbac: bool,
        #[arg(long)]
        purge_protection: bool,
        /// Soft-delete retention in days (7-90)
        #[arg(long)]
        retention_days: Option<u32>,
        /// Tag as key=value (repeatable)
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
    /// Delete a vault
    Delete {
        name: String,
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
    },
}

/// Vault selection shared by object commands.
#[derive(Args)]
struct VaultArg {
    /// Vault name (defaults to AKV_DEFAULT_VAULT)
    #[arg(long)]
    vault: Option<String>,
}

/// Lifecycle attributes shared by create and update commands.
#[derive(Args)]
struct Lifecycle {
    /// Expiry (RFC 3339)
    #[arg(long, value_parser = parse_datetime)]
    expires: Option<DateTime<Utc>>,
    /// Activation date (RFC 3339)
    #[arg(long, value_parser = parse_datetime)]
    not_before: Option<DateTime<Utc>>,
    /// Tag as key=value (repeatable)
    #[arg(long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum SecretCommands {
    /// List secrets
    List {
        #[command(flatten)]
        vault: VaultArg,
    },
    /// List versions of a secret
    Versions {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Show a secret, including its value
    Show {
        name: String,
        #[arg(long)]
        version: Option<String>,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Create or add a new version of a secret
    Set {
        name: String,
        /// Secret value; read from stdin when omitted
        #[arg(long)]
        value: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long)]
        disabled: bool,
        #[command(flatten)]
        lifecycle: Lifecycle,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Update secret attributes
    Update {
        name: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        content_type: Option<String>,
        #[command(flatten)]
        lifecycle: Lifecycle,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Soft-delete a secret
    Delete {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Recover a soft-deleted secret
    Recover {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Permanently delete a soft-deleted secret
    Purge {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// List soft-deleted secrets
    Deleted {
        #[command(flatten)]
        vault: VaultArg,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// List keys
    List {
        #[command(flatten)]
        vault: VaultArg,
    },
    /// List versions of a key
    Versions {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Show a key
    Show {
        name: String,
        #[arg(long)]
        version: Option<String>,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Create a key
    Create {
        name: String,
        #[arg(long = "kty", value_enum, default_value = "rsa")]
        key_type: KeyTypeArg,
        /// RSA key size
        #[arg(long)]
        size: Option<u32>,
        /// EC curve
        #[arg(long, value_enum)]
        curve: Option<CurveArg>,
        /// Permitted operations (repeatable)
        #[arg(long = "op")]
        ops: Vec<String>,
        #[arg(long)]
        disabled: bool,
        #[command(flatten)]
        lifecycle: Lifecycle,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Update key attributes
    Update {
        name: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
        /// Replace the permitted operations (repeatable)
        #[arg(long = "op")]
        ops: Vec<String>,
        #[command(flatten)]
        lifecycle: Lifecycle,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Soft-delete a key
    Delete {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Recover a soft-deleted key
    Recover {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Permanently delete a soft-deleted key
    Purge {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// List soft-deleted keys
    Deleted {
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Download a protected key backup
    Backup {
        name: String,
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Restore a key from a backup file
    Restore {
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        vault: VaultArg,
    },
}

#[derive(Subcommand)]
enum CertCommands {
    /// List certificates
    List {
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Show a certificate
    Show {
        name: String,
        #[arg(long)]
        version: Option<String>,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Start issuing a certificate
    Create {
        name: String,
        /// Policy JSON file; the default self-signed policy when omitted
        #[arg(long)]
        policy: Option<PathBuf>,
        #[arg(long)]
        disabled: bool,
        /// Tag as key=value (repeatable)
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Enable, disable or retag a certificate
    Update {
        name: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
        /// Tag as key=value (repeatable)
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Soft-delete a certificate
    Delete {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Import a PFX or PEM bundle
    Import {
        name: String,
        #[arg(long)]
        file: PathBuf,
        /// Bundle password
        #[arg(long, env = "AKV_CERT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        disabled: bool,
        /// Tag as key=value (repeatable)
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Download the public certificate
    Download {
        name: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_enum, default_value = "pem")]
        encoding: EncodingArg,
        #[arg(long)]
        version: Option<String>,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Print the default self-signed policy
    Policy,
    /// List soft-deleted certificates
    Deleted {
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Recover a soft-deleted certificate
    Recover {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
    /// Permanently delete a soft-deleted certificate
    Purge {
        name: String,
        #[command(flatten)]
        vault: VaultArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SkuArg {
    Standard,
    Premium,
}

impl From<SkuArg> for VaultSku {
    fn from(sku: SkuArg) -> Self {
        match sku {
            SkuArg::Standard => VaultSku::Standard,
            SkuArg::Premium => VaultSku::Premium,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KeyTypeArg {
    #[value(name = "rsa")]
    Rsa,
    #[value(name = "rsa-hsm")]
    RsaHsm,
    #[value(name = "ec")]
    Ec,
    #[value(name = "ec-hsm")]
    EcHsm,
    #[value(name = "oct-hsm")]
    OctHsm,
}

impl From<KeyTypeArg> for KeyType {
    fn from(kty: KeyTypeArg) -> Self {
        match kty {
            KeyTypeArg::Rsa => KeyType::Rsa,
            KeyTypeArg::RsaHsm => KeyType::RsaHsm,
            KeyTypeArg::Ec => KeyType::Ec,
            KeyTypeArg::EcHsm => KeyType::EcHsm,
            KeyTypeArg::OctHsm => KeyType::OctHsm,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CurveArg {
    #[value(name = "P-256")]
    P256,
    #[value(name = "P-256K")]
    P256K,
    #[value(name = "P-384")]
    P384,
    #[value(name = "P-521")]
    P521,
}

impl From<CurveArg> for KeyCurve {
    fn from(curve: CurveArg) -> Self {
        match curve {
            CurveArg::P256 => KeyCurve::P256,
            CurveArg::P256K => KeyCurve::P256K,
            CurveArg::P384 => KeyCurve::P384,
            CurveArg::P521 => KeyCurve::P521,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EncodingArg {
    Pem,
    Der,
}

impl From<EncodingArg> for CertificateEncoding {
    fn from(encoding: EncodingArg) -> Self {
        match encoding {
            EncodingArg::Pem => CertificateEncoding::Pem,
            EncodingArg::Der => CertificateEncoding::Der,
        }
    }
}

async fn run(cli: Cli, ctx: Context) -> anyhow::Result<()> {
    let format = &cli.format;
    match cli.command {
        Commands::Login { strategy } => commands::login(ctx, strategy, format).await,
        Commands::Logout => commands::logout(&ctx, format).await,
        Commands::Status => commands::status(&ctx, format).await,
        Commands::Account { command } => match command {
            AccountCommands::List => commands::account_list(&ctx, format).await,
            AccountCommands::Set { subscription } => {
                commands::account_set(&ctx, &subscription, format).await
            }
        },
        Commands::Vault { command } => match command {
            VaultCommands::List { resource_group } => {
                commands::vault_list(&ctx, resource_group.as_deref(), format).await
            }
            VaultCommands::Show {
                name,
                resource_group,
            } => commands::vault_show(&ctx, &name, resource_group.as_deref(), format).await,
            VaultCommands::Create {
                name,
                resource_group,
                location,
                sku,
                rbac,
                purge_protection,
                retention_days,
                tags,
            } => {
                let input = keyvault_ops::VaultCreateInput {
                    name,
                    resource_group,
                    location,
                    sku: sku.into(),
                    enable_rbac_authorization: rbac,
                    enable_purge_protection: purge_protection,
                    retention_days,
                    tags: tags.into_iter().collect(),
                };
                commands::vault_create(&ctx, &input, format).await
            }
            VaultCommands::Delete {
                name,
                resource_group,
            } => commands::vault_delete(&ctx, &name, resource_group.as_deref(), format).await,
        },
        Commands::Secret { command } => commands::secret(&ctx, command, format).await,
        Commands::Key { command } => commands::key(&ctx, command, format).await,
        Commands::Cert { command } => commands::cert(&ctx, command, format).await,
    }
}

/// One-line hint for failures the user can fix.
fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    let kv = err.downcast_ref::<KeyVaultError>().or_else(|| {
        err.downcast_ref::<akv_auth::AuthError>()
            .and_then(|auth| match auth {
                akv_auth::AuthError::Cli(kv) => Some(kv),
                _ => None,
            })
    })?;
    match kv {
        KeyVaultError::NotLoggedIn { .. } => Some("Run 'akv login' to sign in."),
        KeyVaultError::CliNotInstalled { .. } => {
            Some("Install the Azure CLI or set AZ_PATH to its location.")
        }
        KeyVaultError::Forbidden { .. } => {
            Some("Your identity lacks the data-plane role or access policy for this vault.")
        }
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match Context::load() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| ctx.config.log_level.clone());
    akv_config_and_utils::init_logging(&level);

    let format = cli.format;
    if let Err(e) = run(cli, ctx).await {
        output::print_error(&format!("{:#}", e), &format);
        if let Some(hint) = hint_for(&e) {
            eprintln!("{}", hint);
        }
        std::process::exit(1);
    }
}

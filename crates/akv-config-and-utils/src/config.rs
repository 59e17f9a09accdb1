//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default upper bound for a single `az` invocation.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const DEFAULT_TENANT: &str = "organizations";
const DEFAULT_REDIRECT_PORT: u16 = 8400;

/// Which authentication flow the front end drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStrategy {
    #[default]
    AzureCli,
    DeviceCode,
    #[serde(rename = "oauth")]
    OAuth,
    Mock,
}

impl AuthStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStrategy::AzureCli => "azure_cli",
            AuthStrategy::DeviceCode => "device_code",
            AuthStrategy::OAuth => "oauth",
            AuthStrategy::Mock => "mock",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "azure_cli" | "cli" => Ok(AuthStrategy::AzureCli),
            "device_code" | "device" => Ok(AuthStrategy::DeviceCode),
            "oauth" => Ok(AuthStrategy::OAuth),
            "mock" => Ok(AuthStrategy::Mock),
            other => Err(CoreError::Config(format!("unknown auth strategy: {other}"))),
        }
    }
}

/// OAuth2 authorization-code settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    /// Identity provider base, e.g. `https://login.microsoftonline.com`.
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Loopback port the redirect listener binds on.
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_redirect_port() -> u16 {
    DEFAULT_REDIRECT_PORT
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "profile".to_string(),
        "offline_access".to_string(),
        "https://vault.azure.net/user_impersonation".to_string(),
    ]
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            client_id: None,
            redirect_port: default_redirect_port(),
            scopes: default_scopes(),
        }
    }
}

impl OAuthSettings {
    /// `http://localhost:{port}/callback`
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }

    /// Parsed authority, validated as an absolute URL.
    pub fn authority_url(&self) -> CoreResult<Url> {
        Url::parse(&self.authority).map_err(CoreError::from)
    }
}

/// Main configuration, stored as JSON at `~/.akv-manager/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub auth_strategy: AuthStrategy,
    /// Directory (tenant) id or domain. `None` lets the provider choose.
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub oauth: OAuthSettings,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Vault used when a command omits `--vault`.
    #[serde(default)]
    pub default_vault: Option<String>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auth_strategy: AuthStrategy::default(),
            tenant: None,
            oauth: OAuthSettings::default(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            default_vault: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Tenant used for OAuth endpoints when none is configured.
    pub fn oauth_tenant(&self) -> &str {
        self.tenant.as_deref().unwrap_or(DEFAULT_TENANT)
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `AKV_*` overrides from the given lookup. Empty values are ignored
    /// and an unknown strategy leaves the current one in place.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(level) = get("AKV_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(strategy) = get("AKV_AUTH_STRATEGY") {
            match strategy.parse() {
                Ok(parsed) => self.auth_strategy = parsed,
                Err(err) => tracing::warn!(error = %err, "ignoring AKV_AUTH_STRATEGY"),
            }
        }
        if let Some(tenant) = get("AKV_TENANT") {
            self.tenant = Some(tenant);
        }
        if let Some(client_id) = get("AKV_OAUTH_CLIENT_ID") {
            self.oauth.client_id = Some(client_id);
        }
        if let Some(vault) = get("AKV_DEFAULT_VAULT") {
            self.default_vault = Some(vault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.auth_strategy, AuthStrategy::AzureCli);
        assert_eq!(config.command_timeout_secs, DEFAULT_COMMAND_TIMEOUT_SECS);
        assert_eq!(config.oauth.redirect_uri(), "http://localhost:8400/callback");
        assert_eq!(config.oauth_tenant(), "organizations");
    }

    #[test]
    fn test_config_load_from_partial_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(
            &config_path,
            r#"{ "log_level": "debug", "auth_strategy": "device_code", "oauth": { "client_id": "abc" } }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.auth_strategy, AuthStrategy::DeviceCode);
        assert_eq!(config.oauth.client_id.as_deref(), Some("abc"));
        assert_eq!(config.oauth.authority, DEFAULT_AUTHORITY);
        assert!(config.oauth.scopes.contains(&"offline_access".to_string()));
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            tenant: Some("contoso.onmicrosoft.com".to_string()),
            default_vault: Some("team-vault".to_string()),
            auth_strategy: AuthStrategy::Mock,
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("missing"));

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.command_timeout_secs, DEFAULT_COMMAND_TIMEOUT_SECS);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json").unwrap();

        assert!(matches!(
            Config::load_from_file(&config_path),
            Err(CoreError::Json(_))
        ));
    }

    #[test]
    fn env_overrides_apply_and_skip_blank_values() {
        let vars: HashMap<&str, &str> = [
            ("AKV_LOG_LEVEL", "trace"),
            ("AKV_AUTH_STRATEGY", "oauth"),
            ("AKV_TENANT", "  "),
            ("AKV_OAUTH_CLIENT_ID", "client-123"),
            ("AKV_DEFAULT_VAULT", "ops-kv"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.log_level, "trace");
        assert_eq!(config.auth_strategy, AuthStrategy::OAuth);
        assert_eq!(config.tenant, None);
        assert_eq!(config.oauth.client_id.as_deref(), Some("client-123"));
        assert_eq!(config.default_vault.as_deref(), Some("ops-kv"));
    }

    #[test]
    fn unknown_strategy_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| (name == "AKV_AUTH_STRATEGY").then(|| "kerberos".to_string()));
        assert_eq!(config.auth_strategy, AuthStrategy::AzureCli);
    }

    #[test]
    fn strategy_parsing_accepts_aliases() {
        assert_eq!("cli".parse::<AuthStrategy>().unwrap(), AuthStrategy::AzureCli);
        assert_eq!("device-code".parse::<AuthStrategy>().unwrap(), AuthStrategy::DeviceCode);
        assert_eq!("OAuth".parse::<AuthStrategy>().unwrap(), AuthStrategy::OAuth);
        assert!("nope".parse::<AuthStrategy>().is_err());
        assert_eq!(AuthStrategy::DeviceCode.to_string(), "device_code");
    }

    #[test]
    fn strategy_serializes_snake_case() {
        let json = serde_json::to_string(&AuthStrategy::AzureCli).unwrap();
        assert_eq!(json, "\"azure_cli\"");
        let json = serde_json::to_string(&AuthStrategy::OAuth).unwrap();
        assert_eq!(json, "\"oauth\"");
    }
}

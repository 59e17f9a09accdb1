//! Shared wiring for every command: config, runner, services, session store.

use akv_auth::{AuthProvider, AuthService, DeviceCodeAuth};
use akv_config_and_utils::{AuthStrategy, Config, Paths};
use akv_storage::{create_storage, MemoryStorage, SecureStorage, SessionStore};
use anyhow::{Context as _, Result};
use az_cli_runner::{AzCliRunner, CommandRunner};
use keyvault_ops::KeyVaultClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

pub struct Context {
    pub config: Config,
    pub runner: Arc<dyn CommandRunner>,
    pub client: KeyVaultClient,
}

impl Context {
    pub fn load() -> Result<Self> {
        let paths = Paths::new()?;
        let config = Config::load(&paths).context("failed to load configuration")?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(
            AzCliRunner::new().with_default_timeout(Duration::from_secs(config.command_timeout_secs)),
        );
        Self {
            client: KeyVaultClient::new(runner.clone()),
            runner,
            config,
        }
    }

    /// Vault from `--vault`, else the configured default.
    pub fn vault(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.config.default_vault.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("No vault given. Pass --vault or set AKV_DEFAULT_VAULT.")
            })
    }

    /// Platform secure store, or an in-memory one when the platform store is
    /// unavailable (sessions then last for this process only).
    pub fn session_store(&self) -> Result<SessionStore> {
        let storage: Arc<dyn SecureStorage> = match create_storage() {
            Ok(storage) => Arc::from(storage),
            Err(err) => {
                warn!(error = %err, "secure storage unavailable, using in-memory store");
                Arc::new(MemoryStorage::new())
            }
        };
        Ok(SessionStore::new(storage)?)
    }

    /// Provider for the configured strategy. Device codes are printed as
    /// soon as the CLI issues them.
    pub fn provider(&self) -> Result<Arc<dyn AuthProvider>> {
        if self.config.auth_strategy == AuthStrategy::DeviceCode {
            let auth = Arc::new(DeviceCodeAuth::new(
                self.runner.clone(),
                self.config.tenant.clone(),
            ));
            let mut codes = auth.device_codes();
            tokio::spawn(async move {
                loop {
                    match codes.recv().await {
                        Ok(info) => {
                            eprintln!("{}", info.message);
                            eprintln!("  URL:  {}", info.verification_url);
                            eprintln!("  Code: {}", info.user_code);
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });
            return Ok(auth);
        }

        Ok(akv_auth::provider_for(&self.config, self.runner.clone())?)
    }

    /// Auth service with any existing session already resolved.
    pub async fn auth(&self) -> Result<Arc<AuthService>> {
        let service = AuthService::start(self.provider()?, self.session_store()?).await;
        debug!(state = %service.state(), strategy = %service.strategy(), "auth initialized");
        Ok(service)
    }
}

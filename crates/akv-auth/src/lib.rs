//! Authentication for AKV Manager.
//!
//! [`AuthService`] drives a rust-fsm state machine over one of four
//! [`AuthProvider`] strategies: the Azure CLI's own login, the CLI's
//! device-code flow, a PKCE authorization-code flow, and an offline mock.

pub mod device_code;
mod error;
pub mod fsm;
pub mod jwt;
mod provider;
pub mod providers;
mod service;

pub use device_code::{parse_device_code, DeviceCodeInfo};
pub use error::{AuthError, AuthResult};
pub use fsm::{AuthState, AuthStateChanged};
pub use provider::{AuthProvider, Session};
pub use providers::{
    AzureCliAuth, DeviceCodeAuth, DeviceCodeConfig, LoopbackRedirect, MockAuth, OAuthAuth,
    OAuthConfig, RedirectSource, UrlOpener,
};
pub use service::AuthService;

use akv_config_and_utils::{AuthStrategy, Config};
use az_cli_runner::CommandRunner;
use std::sync::Arc;

/// Build the provider selected by `config.auth_strategy`.
pub fn provider_for(
    config: &Config,
    runner: Arc<dyn CommandRunner>,
) -> AuthResult<Arc<dyn AuthProvider>> {
    let tenant = config.tenant.clone();
    let provider: Arc<dyn AuthProvider> = match config.auth_strategy {
        AuthStrategy::AzureCli => Arc::new(AzureCliAuth::new(runner, tenant)),
        AuthStrategy::DeviceCode => Arc::new(DeviceCodeAuth::new(runner, tenant)),
        AuthStrategy::OAuth => {
            let oauth = OAuthConfig::from_settings(&config.oauth, config.oauth_tenant())?;
            Arc::new(OAuthAuth::new(oauth)?)
        }
        AuthStrategy::Mock => Arc::new(MockAuth::new()),
    };
    Ok(provider)
}

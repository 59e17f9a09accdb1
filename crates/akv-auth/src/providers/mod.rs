//! Authentication strategies.

mod azure_cli;
mod device_code;
mod mock;
mod oauth;

pub use azure_cli::{AzureCliAuth, CLI_SESSION_CHECK_INTERVAL};
pub use device_code::{DeviceCodeAuth, DeviceCodeConfig, DEVICE_CODE_SESSION_CHECK_INTERVAL};
pub use mock::{MockAuth, MOCK_SESSION_CHECK_INTERVAL, MOCK_USER_ID};
pub use oauth::{
    AuthorizationRequest, BrowserOpener, LoopbackRedirect, OAuthAuth, OAuthConfig, PkcePair,
    RedirectSource, UrlOpener, OAUTH_SESSION_CHECK_INTERVAL,
};

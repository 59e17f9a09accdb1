//! Core types, configuration, and utilities for AKV Manager.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    AuthStrategy, Config, OAuthSettings, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_LOG_LEVEL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service};
pub use paths::Paths;

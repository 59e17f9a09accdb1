//! # AZ CLI Runner
//!
//! Owns process execution, timeout control and output capture for the
//! Azure CLI (`az`). Higher layers build an [`AzCommand`], hand it to a
//! [`CommandRunner`] and interpret the [`CommandResult`].
//!
//! The runner never fails: a missing binary, a non-zero exit or a timeout
//! all come back as `success = false` with the reason in `error`.

mod command;
mod error;
mod result;
mod runner;
#[cfg(any(test, feature = "test-util"))]
mod scripted;

pub use command::{shell_quote, AzCommand, OutputFormat};
pub use error::RunnerError;
pub use result::CommandResult;
pub use runner::{AzCliRunner, CommandRunner, OutputLine, SpawnedCommand};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedRunner;

/// Timeout for quick reads (`show`, `list`, `account show`).
pub const TIMEOUT_SHORT_SECS: u64 = 30;
/// Timeout for mutating or slow operations (create, import, login).
pub const TIMEOUT_LONG_SECS: u64 = 120;

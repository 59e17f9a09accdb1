//! # Observability
//!
//! Logging setup shared by every AKV Manager binary.
//!
//! Libraries only emit `tracing` events. Binaries call [`init`] or
//! [`init_with_config`] once at startup, which installs:
//!
//! - a JSONL file layer writing to `~/.akv-manager/logs/akv.jsonl`
//!   (one object per line: timestamp, level, service, pid, target, message,
//!   fields), with sensitive field values redacted
//! - an optional compact stderr layer for interactive use
//!
//! `RUST_LOG` overrides the configured default level.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "akv".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod file_sink;
mod json_layer;

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_sink::{default_log_path, FileSink};
pub use json_layer::{redact_fields, JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name written into every log line (e.g. "akv").
    pub service_name: String,

    /// Default filter directive when `RUST_LOG` is unset.
    pub default_level: String,

    /// Custom JSONL path. Defaults to [`default_log_path`].
    pub log_path: Option<PathBuf>,

    /// Write the JSONL file layer.
    pub file_output: bool,

    /// Also emit compact human-readable lines to stderr.
    pub also_stderr: bool,

    /// Filter directive for the stderr layer.
    pub stderr_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "akv".into(),
            default_level: "info".into(),
            log_path: None,
            file_output: true,
            also_stderr: false,
            stderr_level: "warn".into(),
        }
    }
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Calling this twice is harmless: the second call leaves the first
/// subscriber in place.
pub fn init_with_config(config: LogConfig) {
    let file_layer = if config.file_output {
        let path = config.log_path.clone().or_else(default_log_path);
        match path.map(|p| FileSink::open(&p)) {
            Some(Ok(sink)) => Some(
                JsonLayer::new(config.service_name.clone(), sink)
                    .with_filter(env_filter_or(&config.default_level)),
            ),
            Some(Err(err)) => {
                eprintln!("akv: file logging disabled: {err}");
                None
            }
            None => None,
        }
    } else {
        None
    };

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(env_filter_or(&config.stderr_level))
    });

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
}

fn env_filter_or(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn, Level};

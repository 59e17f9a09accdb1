//! Logging initialization.
//!
//! Thin wrapper over the observability crate so binaries share one layout:
//! structured JSONL at `~/.akv-manager/logs/akv.jsonl`, optional stderr.

pub use observability::{init_with_config, LogConfig};

/// Initialize logging for the `akv` binary.
///
/// `level` is the default filter directive; `RUST_LOG` takes precedence.
/// Warnings and errors are mirrored to stderr.
pub fn init_logging(level: &str) {
    init_logging_for_service("akv", level);
}

/// Initialize logging with a custom service name.
pub fn init_logging_for_service(service_name: &str, level: &str) {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        also_stderr: true,
        stderr_level: stderr_level_for(level).into(),
        ..Default::default()
    });
}

/// The stderr layer stays at `warn` unless the user asked for something else.
fn stderr_level_for(level: &str) -> &str {
    match observability::parse_level(level) {
        tracing::Level::INFO => "warn",
        _ => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_level_defaults_to_warn_for_info() {
        assert_eq!(stderr_level_for("debug"), "debug");
        assert_eq!(stderr_level_for("trace"), "trace");
        assert_eq!(stderr_level_for("info"), "warn");
        assert_eq!(stderr_level_for("error"), "error");
    }
}

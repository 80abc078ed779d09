//! # Observability
//!
//! Centralized logging setup for the fleet-audit workspace.
//!
//! Library crates only ever use `tracing` macros. The binary calls
//! [`init_with_config`] once at startup and decides where events go:
//!
//! - a compact, human-readable stream on stderr
//! - optionally, structured JSONL appended to a log file
//!   (`~/.fleet-audit/logs/audit.jsonl` unless overridden)
//!
//! `RUST_LOG` always wins over the configured default level.
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "fleet-audit".into(),
//!     default_level: "info".into(),
//!     json_file: true,
//!     ..Default::default()
//! });
//! tracing::info!(region = "eu-west-1", "scanning region");
//! ```

mod file_sink;

pub use file_sink::{default_log_path, LogFileWriter};

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, attached to the startup event.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Overridden by `RUST_LOG`.
    pub default_level: String,

    /// Emit compact logs on stderr.
    pub stderr: bool,

    /// Also append structured JSONL to a log file.
    pub json_file: bool,

    /// Custom JSONL path. Defaults to [`default_log_path`].
    pub log_path: Option<PathBuf>,

    /// Use ANSI colors on stderr.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            stderr: true,
            json_file: false,
            log_path: None,
            ansi: true,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// Installing a second global subscriber is a no-op, so this is safe to call
/// from tests. If the JSONL file cannot be opened, logging continues on
/// stderr and a warning is emitted once the subscriber is up.
pub fn init_with_config(config: LogConfig) {
    let stderr_layer = config.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .with_filter(env_filter(&config.default_level))
    });

    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);
    let mut file_error = None;
    let file_layer = if config.json_file {
        match LogFileWriter::new(&log_path) {
            Ok(writer) => Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer)
                    .with_filter(env_filter(&config.default_level)),
            ),
            Err(err) => {
                file_error = Some(err);
                None
            }
        }
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match file_error {
        Some(err) => tracing::warn!(
            log_path = %log_path.display(),
            error = %err,
            "could not open log file, logging to stderr only"
        ),
        None => tracing::debug!(
            service = %config.service_name,
            json_file = config.json_file,
            "observability initialized"
        ),
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.stderr);
        assert!(!config.json_file);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_with_config(LogConfig::default());
        init_with_config(LogConfig {
            service_name: "second".into(),
            ..Default::default()
        });
    }
}

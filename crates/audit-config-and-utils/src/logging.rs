//! Logging initialization.
//!
//! Thin wrapper over the observability package so every fleet-audit entry
//! point configures tracing the same way.

use crate::Paths;
use observability::LogConfig;

/// Initialize tracing for a fleet-audit process.
///
/// Compact logs go to stderr. With `json_file` set, structured JSONL is also
/// appended to `paths.log_file()`. `RUST_LOG` overrides `level`.
pub fn init_logging(service_name: &str, level: &str, json_file: bool, paths: Option<&Paths>) {
    let ansi = std::env::var_os("NO_COLOR").is_none();

    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        stderr: true,
        json_file,
        log_path: paths.map(Paths::log_file),
        ansi,
    });
}

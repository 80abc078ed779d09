//! Errors raised while resolving paths and loading configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot access configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed `config.json`.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory to anchor `~/.fleet-audit`.
    #[error("cannot resolve fleet-audit directory: {0}")]
    Path(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

//! Configuration, file-system paths and logging setup shared by the
//! fleet-audit crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    AwsSettings, CommandSettings, Config, InventorySettings, PollSettings, RetrySettings,
    DEFAULT_CONCURRENCY, DEFAULT_DOCUMENT_NAME, DEFAULT_LOG_LEVEL,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;

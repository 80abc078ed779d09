//! # Remote command runner
//!
//! Runs a command document on managed instances through a
//! [`CommandExecutor`] and reduces each invocation to a single result
//! string.
//!
//! ```text
//! CommandDispatcher (RetryPolicy) ──► CommandInvocation ──► CommandPoller ──► CommandOutcome
//! ```
//!
//! [`CommandRunner`] fans this out across instances with a bounded worker
//! pool and keeps results in input order.

pub mod capability;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod retry;
pub mod runner;
pub mod types;

pub use capability::CommandExecutor;
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use error::{CommandError, CommandResult};
pub use poller::{
    CommandOutcome, CommandPoller, PollerConfig, ResultExtraction, NO_OUTPUT_MARKER,
    UNAVAILABLE_MARKER,
};
pub use retry::{RetryPolicy, RetryState, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use runner::{CommandRunner, InstanceResult, RunReport, RunnerOptions, UnexpectedErrorPolicy};
pub use types::{
    CommandInvocation, CommandSpec, CommandStatus, StatusPage, COMMANDS_PARAMETER, SHELL_DOCUMENT,
};

pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests;

//! Error types for command dispatch and polling.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The target cannot receive commands (not registered, stopped, or
    /// unknown to the management service).
    #[error("instance {instance_id} is not available for commands")]
    InstanceUnavailable { instance_id: String },

    /// The service accepted the request but has not materialized the
    /// invocation yet.
    #[error("invocation for {instance_id} is not registered yet")]
    InvocationNotYetRegistered { instance_id: String },

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("run aborted at {instance_id}: {reason}")]
    Aborted {
        instance_id: String,
        reason: Box<CommandError>,
    },
}

impl CommandError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the error is expected to clear on its own after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::InvocationNotYetRegistered { .. })
    }

    pub fn code(&self) -> &str {
        match self {
            Self::InstanceUnavailable { .. } => "instance_unavailable",
            Self::InvocationNotYetRegistered { .. } => "invocation_not_yet_registered",
            Self::Service { code, .. } => code,
            Self::Aborted { .. } => "run_aborted",
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

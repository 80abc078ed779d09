//! Command submission.

use crate::capability::CommandExecutor;
use crate::error::{CommandError, CommandResult};
use crate::retry::RetryPolicy;
use crate::types::{CommandInvocation, CommandSpec};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of a dispatch that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched(CommandInvocation),
    /// The target cannot receive commands; nothing was submitted.
    Unavailable,
    /// Cancelled while waiting to retry; nothing was submitted.
    Cancelled,
}

/// Submits a command to one instance, retrying transient failures.
#[derive(Clone)]
pub struct CommandDispatcher {
    executor: Arc<dyn CommandExecutor>,
    retry: RetryPolicy,
}

impl CommandDispatcher {
    pub fn new(executor: Arc<dyn CommandExecutor>, retry: RetryPolicy) -> Self {
        Self { executor, retry }
    }

    /// `InstanceUnavailable` becomes [`DispatchOutcome::Unavailable`] without
    /// a retry. Every other non-transient error is returned as is.
    pub async fn dispatch(
        &self,
        instance_id: &str,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> CommandResult<DispatchOutcome> {
        let executor = &self.executor;
        let submitted = self
            .retry
            .run(
                move || executor.submit_command(instance_id, spec),
                CommandError::is_transient,
                cancel,
            )
            .await;

        match submitted {
            Ok(command_id) => {
                info!(
                    instance_id,
                    command_id = %command_id,
                    document = %spec.document_name,
                    "command dispatched"
                );
                Ok(DispatchOutcome::Dispatched(CommandInvocation::new(
                    command_id,
                    instance_id,
                )))
            }
            Err(CommandError::InstanceUnavailable { .. }) => {
                debug!(instance_id, "instance unavailable for commands");
                Ok(DispatchOutcome::Unavailable)
            }
            Err(err) if err.is_transient() && cancel.is_cancelled() => {
                debug!(instance_id, "dispatch cancelled while retrying");
                Ok(DispatchOutcome::Cancelled)
            }
            Err(err) => Err(err),
        }
    }
}

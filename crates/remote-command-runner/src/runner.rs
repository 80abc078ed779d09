//! Fan-out of one command across many instances.

use crate::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::error::{CommandError, CommandResult};
use crate::poller::{CommandOutcome, CommandPoller};
use crate::types::CommandSpec;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What to do when dispatch or polling fails with an error that has no
/// dedicated outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnexpectedErrorPolicy {
    /// Record `error: <message>` for the instance and keep going.
    #[default]
    SkipInstance,
    /// Stop the run and return the error.
    Abort,
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub concurrency: usize,
    pub on_unexpected_error: UnexpectedErrorPolicy,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            on_unexpected_error: UnexpectedErrorPolicy::SkipInstance,
        }
    }
}

/// Result for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceResult {
    pub instance_id: String,
    pub result: String,
    pub succeeded: bool,
}

/// Per-instance results in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub results: Vec<InstanceResult>,
}

impl RunReport {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.results
            .iter()
            .map(|r| (r.instance_id.clone(), r.result.clone()))
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }
}

/// Dispatches and polls a command on each instance, a bounded number at a
/// time.
pub struct CommandRunner {
    dispatcher: CommandDispatcher,
    poller: CommandPoller,
    options: RunnerOptions,
}

impl CommandRunner {
    pub fn new(
        dispatcher: CommandDispatcher,
        poller: CommandPoller,
        options: RunnerOptions,
    ) -> Self {
        Self {
            dispatcher,
            poller,
            options,
        }
    }

    /// Dispatch then poll on one instance.
    pub async fn run_on_instance(
        &self,
        instance_id: &str,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> CommandResult<CommandOutcome> {
        if cancel.is_cancelled() {
            return Ok(CommandOutcome::Cancelled);
        }

        match self.dispatcher.dispatch(instance_id, spec, cancel).await? {
            DispatchOutcome::Unavailable => Ok(CommandOutcome::Unavailable),
            DispatchOutcome::Cancelled => Ok(CommandOutcome::Cancelled),
            DispatchOutcome::Dispatched(mut invocation) => {
                self.poller.poll(&mut invocation, cancel).await
            }
        }
    }

    /// Run `spec` on every instance.
    ///
    /// Under [`UnexpectedErrorPolicy::Abort`] the first unexpected error
    /// cancels work still in flight and is returned as
    /// [`CommandError::Aborted`].
    pub async fn run_on_instances(
        &self,
        instance_ids: &[String],
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> CommandResult<RunReport> {
        info!(
            instances = instance_ids.len(),
            concurrency = self.options.concurrency,
            document = %spec.document_name,
            "running command"
        );

        // Results arrive in completion order so an abort is not held back
        // by slower instances queued ahead of the failing one.
        let run_cancel = cancel.child_token();
        let mut pending = stream::iter(instance_ids.iter().enumerate())
            .map(|(index, instance_id)| {
                let run_cancel = &run_cancel;
                async move {
                    let outcome = self.run_on_instance(instance_id, spec, run_cancel).await;
                    (index, instance_id, outcome)
                }
            })
            .buffer_unordered(self.options.concurrency.max(1));

        let mut finished = Vec::with_capacity(instance_ids.len());
        while let Some((index, instance_id, outcome)) = pending.next().await {
            let entry = match outcome {
                Ok(outcome) => {
                    info!(
                        instance_id = %instance_id,
                        succeeded = outcome.is_success(),
                        result = %outcome.result_string(),
                        "instance finished"
                    );
                    InstanceResult {
                        instance_id: instance_id.clone(),
                        result: outcome.result_string(),
                        succeeded: outcome.is_success(),
                    }
                }
                Err(err) => match self.options.on_unexpected_error {
                    UnexpectedErrorPolicy::SkipInstance => {
                        warn!(
                            instance_id = %instance_id,
                            error = %err,
                            "command failed, skipping instance"
                        );
                        InstanceResult {
                            instance_id: instance_id.clone(),
                            result: format!("error: {err}"),
                            succeeded: false,
                        }
                    }
                    UnexpectedErrorPolicy::Abort => {
                        run_cancel.cancel();
                        warn!(
                            instance_id = %instance_id,
                            error = %err,
                            "command failed, aborting run"
                        );
                        return Err(CommandError::Aborted {
                            instance_id: instance_id.clone(),
                            reason: Box::new(err),
                        });
                    }
                },
            };
            finished.push((index, entry));
        }

        finished.sort_by_key(|(index, _)| *index);
        let report = RunReport {
            results: finished.into_iter().map(|(_, entry)| entry).collect(),
        };

        info!(
            instances = report.results.len(),
            succeeded = report.succeeded(),
            "command run complete"
        );
        Ok(report)
    }
}

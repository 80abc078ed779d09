//! Status polling for dispatched commands.
//!
//! A poll ends on a terminal status, when the wait budget is spent, or when
//! the caller cancels.

use crate::capability::CommandExecutor;
use crate::error::{CommandError, CommandResult};
use crate::types::{CommandInvocation, CommandStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result string for an instance that cannot receive commands.
pub const UNAVAILABLE_MARKER: &str = "unavailable";

/// Result string for a successful command that printed nothing.
pub const NO_OUTPUT_MARKER: &str = "N/A";

/// How much of the collected output becomes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultExtraction {
    /// First line of the trimmed output.
    #[default]
    FirstLine,
    /// The whole trimmed output.
    FullOutput,
}

impl ResultExtraction {
    pub fn extract(&self, output: &str) -> String {
        let trimmed = output.trim();
        match self {
            Self::FirstLine => trimmed.lines().next().unwrap_or_default().trim().to_string(),
            Self::FullOutput => trimmed.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_wait: Duration,
    /// Cap on output pages collected after `Success`.
    pub max_output_pages: usize,
    pub extraction: ResultExtraction,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
            max_output_pages: 100,
            extraction: ResultExtraction::FirstLine,
        }
    }
}

/// How a command ended on one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// `Success`; holds the extracted output.
    Output(String),
    /// Any other terminal status.
    Failed {
        status: CommandStatus,
        detail: String,
    },
    Unavailable,
    TimedOut { waited: Duration },
    Cancelled,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Output(_))
    }

    /// The per-instance value reported to the caller.
    pub fn result_string(&self) -> String {
        match self {
            Self::Output(output) if output.is_empty() => NO_OUTPUT_MARKER.to_string(),
            Self::Output(output) => output.clone(),
            Self::Failed { status, detail } => format!("failed ({status}): {detail}"),
            Self::Unavailable => UNAVAILABLE_MARKER.to_string(),
            Self::TimedOut { waited } => format!("timed out after {}s", waited.as_secs()),
            Self::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Queries an invocation until it reaches a terminal status.
#[derive(Clone)]
pub struct CommandPoller {
    executor: Arc<dyn CommandExecutor>,
    config: PollerConfig,
}

impl CommandPoller {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: PollerConfig) -> Self {
        Self { executor, config }
    }

    /// Poll `invocation` to completion, recording status and output on it.
    ///
    /// Waiting statuses and a not-yet-registered invocation are re-queried
    /// after the interval. Any other query error is returned.
    pub async fn poll(
        &self,
        invocation: &mut CommandInvocation,
        cancel: &CancellationToken,
    ) -> CommandResult<CommandOutcome> {
        let started = Instant::now();
        let deadline = started + self.config.max_wait;

        loop {
            if cancel.is_cancelled() {
                return Ok(CommandOutcome::Cancelled);
            }

            match self
                .executor
                .get_command_status(&invocation.command_id, &invocation.instance_id, None)
                .await
            {
                Ok(page) => {
                    invocation.status = page.status.clone();
                    invocation.next_token = page.next_token.clone();

                    if page.status == CommandStatus::Success {
                        invocation.stdout.push_str(&page.stdout);
                        self.collect_output(invocation).await;
                        let output = self.config.extraction.extract(&invocation.stdout);
                        return Ok(CommandOutcome::Output(output));
                    }

                    if page.status.is_terminal() {
                        invocation.stderr = page.stderr;
                        let detail = match self.config.extraction.extract(&invocation.stderr) {
                            detail if detail.is_empty() => "no error output".to_string(),
                            detail => detail,
                        };
                        return Ok(CommandOutcome::Failed {
                            status: page.status,
                            detail,
                        });
                    }

                    debug!(
                        command_id = %invocation.command_id,
                        instance_id = %invocation.instance_id,
                        status = %page.status,
                        "command still running"
                    );
                }
                Err(CommandError::InvocationNotYetRegistered { .. }) => {
                    debug!(
                        command_id = %invocation.command_id,
                        instance_id = %invocation.instance_id,
                        "invocation not registered yet"
                    );
                }
                Err(err) => return Err(err),
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    command_id = %invocation.command_id,
                    instance_id = %invocation.instance_id,
                    waited_secs = self.config.max_wait.as_secs(),
                    "gave up waiting for command"
                );
                return Ok(CommandOutcome::TimedOut {
                    waited: now - started,
                });
            }

            let nap = self.config.interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Ok(CommandOutcome::Cancelled),
                _ = tokio::time::sleep(nap) => {}
            }
        }
    }

    /// Follow output continuation tokens while the status stays `Success`.
    ///
    /// A failing continuation keeps the output read so far.
    async fn collect_output(&self, invocation: &mut CommandInvocation) {
        let mut pages = 1;

        while let Some(token) = invocation.next_token.take() {
            if pages >= self.config.max_output_pages {
                warn!(
                    command_id = %invocation.command_id,
                    instance_id = %invocation.instance_id,
                    pages,
                    "output page limit reached, truncating"
                );
                return;
            }

            match self
                .executor
                .get_command_status(&invocation.command_id, &invocation.instance_id, Some(&token))
                .await
            {
                Ok(page) if page.status == CommandStatus::Success => {
                    invocation.stdout.push_str(&page.stdout);
                    invocation.next_token = page.next_token;
                    pages += 1;
                }
                Ok(page) => {
                    warn!(
                        command_id = %invocation.command_id,
                        status = %page.status,
                        "status changed while reading output, stopping"
                    );
                    return;
                }
                Err(err) => {
                    warn!(
                        command_id = %invocation.command_id,
                        error = %err,
                        "failed to read further output"
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommandSpec, StatusPage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers status queries from a script; continuation queries pop from
    /// a separate queue.
    struct ScriptedStatus {
        statuses: Mutex<VecDeque<CommandResult<StatusPage>>>,
        continuations: Mutex<VecDeque<CommandResult<StatusPage>>>,
        tokens_seen: Mutex<Vec<String>>,
        queries: Mutex<u32>,
    }

    impl ScriptedStatus {
        fn new(statuses: Vec<CommandResult<StatusPage>>) -> Arc<Self> {
            Self::with_continuations(statuses, Vec::new())
        }

        fn with_continuations(
            statuses: Vec<CommandResult<StatusPage>>,
            continuations: Vec<CommandResult<StatusPage>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.into()),
                continuations: Mutex::new(continuations.into()),
                tokens_seen: Mutex::new(Vec::new()),
                queries: Mutex::new(0),
            })
        }

        fn queries(&self) -> u32 {
            *self.queries.lock().unwrap()
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedStatus {
        async fn submit_command(&self, _: &str, _: &CommandSpec) -> CommandResult<String> {
            unreachable!("poller never submits")
        }

        async fn get_command_status(
            &self,
            _: &str,
            _: &str,
            output_token: Option<&str>,
        ) -> CommandResult<StatusPage> {
            *self.queries.lock().unwrap() += 1;
            match output_token {
                Some(token) => {
                    self.tokens_seen.lock().unwrap().push(token.to_string());
                    self.continuations.lock().unwrap().pop_front().unwrap()
                }
                None => {
                    let mut statuses = self.statuses.lock().unwrap();
                    if statuses.len() > 1 {
                        statuses.pop_front().unwrap()
                    } else {
                        statuses.front().cloned().unwrap()
                    }
                }
            }
        }
    }

    fn page(status: CommandStatus) -> CommandResult<StatusPage> {
        Ok(StatusPage::new(status))
    }

    fn poller(executor: Arc<ScriptedStatus>) -> CommandPoller {
        CommandPoller::new(executor, PollerConfig::default())
    }

    fn invocation() -> CommandInvocation {
        CommandInvocation::new("cmd-1", "i-1")
    }

    #[tokio::test(start_paused = true)]
    async fn success_yields_first_trimmed_line() {
        let executor = ScriptedStatus::new(vec![
            page(CommandStatus::Pending),
            page(CommandStatus::InProgress),
            Ok(StatusPage::new(CommandStatus::Success).with_stdout("CentOS Linux release 7.9\n")),
        ]);
        let mut inv = invocation();

        let outcome = poller(executor.clone())
            .poll(&mut inv, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Output("CentOS Linux release 7.9".into()));
        assert_eq!(outcome.result_string(), "CentOS Linux release 7.9");
        assert_eq!(inv.status, CommandStatus::Success);
        assert_eq!(executor.queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_marker_carries_stderr() {
        let executor = ScriptedStatus::new(vec![
            page(CommandStatus::InProgress),
            Ok(StatusPage::new(CommandStatus::Failed).with_stderr("access denied\n")),
        ]);
        let mut inv = invocation();

        let outcome = poller(executor)
            .poll(&mut inv, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert!(outcome.result_string().contains("access denied"));
        assert_eq!(inv.stderr, "access denied\n");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_stderr_still_has_marker() {
        let executor = ScriptedStatus::new(vec![page(CommandStatus::Cancelled)]);

        let outcome = poller(executor)
            .poll(&mut invocation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.result_string(), "failed (Cancelled): no error output");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_is_waited_out_until_cancelled() {
        let executor = ScriptedStatus::new(vec![
            page(CommandStatus::InProgress),
            page(CommandStatus::Cancelling),
            page(CommandStatus::Cancelled),
        ]);

        let outcome = poller(executor.clone())
            .poll(&mut invocation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.result_string(), "failed (Cancelled): no error output");
        assert_eq!(executor.queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_success_output_is_na() {
        let executor = ScriptedStatus::new(vec![page(CommandStatus::Success)]);

        let outcome = poller(executor)
            .poll(&mut invocation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.result_string(), NO_OUTPUT_MARKER);
    }

    #[tokio::test(start_paused = true)]
    async fn paginated_output_is_concatenated_without_waiting() {
        let executor = ScriptedStatus::with_continuations(
            vec![Ok(StatusPage::new(CommandStatus::Success)
                .with_stdout("line one\n")
                .with_next_token("t1"))],
            vec![
                Ok(StatusPage::new(CommandStatus::Success)
                    .with_stdout("line two\n")
                    .with_next_token("t2")),
                Ok(StatusPage::new(CommandStatus::Success).with_stdout("line three\n")),
            ],
        );
        let config = PollerConfig {
            extraction: ResultExtraction::FullOutput,
            ..PollerConfig::default()
        };
        let started = Instant::now();
        let mut inv = invocation();

        let outcome = CommandPoller::new(executor.clone(), config)
            .poll(&mut inv, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::Output("line one\nline two\nline three".into())
        );
        assert_eq!(*executor.tokens_seen.lock().unwrap(), vec!["t1", "t2"]);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(inv.next_token.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn output_page_cap_truncates() {
        let executor = ScriptedStatus::with_continuations(
            vec![Ok(StatusPage::new(CommandStatus::Success)
                .with_stdout("a\n")
                .with_next_token("t1"))],
            vec![Ok(StatusPage::new(CommandStatus::Success)
                .with_stdout("b\n")
                .with_next_token("t2"))],
        );
        let config = PollerConfig {
            max_output_pages: 2,
            extraction: ResultExtraction::FullOutput,
            ..PollerConfig::default()
        };

        let outcome = CommandPoller::new(executor.clone(), config)
            .poll(&mut invocation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Output("a\nb".into()));
        assert_eq!(*executor.tokens_seen.lock().unwrap(), vec!["t1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_invocation_counts_as_pending() {
        let executor = ScriptedStatus::new(vec![
            Err(CommandError::InvocationNotYetRegistered {
                instance_id: "i-1".into(),
            }),
            Ok(StatusPage::new(CommandStatus::Success).with_stdout("ok")),
        ]);

        let outcome = poller(executor.clone())
            .poll(&mut invocation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.result_string(), "ok");
        assert_eq!(executor.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn query_errors_propagate() {
        let executor = ScriptedStatus::new(vec![Err(CommandError::service(
            "AccessDeniedException",
            "not allowed",
        ))]);

        let err = poller(executor)
            .poll(&mut invocation(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "AccessDeniedException");
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_command_times_out_at_max_wait() {
        let executor = ScriptedStatus::new(vec![page(CommandStatus::InProgress)]);
        let config = PollerConfig {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(9),
            ..PollerConfig::default()
        };
        let started = Instant::now();

        let outcome = CommandPoller::new(executor.clone(), config)
            .poll(&mut invocation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::TimedOut {
                waited: Duration::from_secs(9)
            }
        );
        assert_eq!(outcome.result_string(), "timed out after 9s");
        assert_eq!(started.elapsed(), Duration::from_secs(9));
        // t = 0, 2, 4, 6, 8, 9
        assert_eq!(executor.queries(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_a_stuck_poll() {
        let executor = ScriptedStatus::new(vec![page(CommandStatus::Delayed)]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let outcome = poller(executor)
            .poll(&mut invocation(), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Cancelled);
        assert_eq!(outcome.result_string(), "cancelled");
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_skips_querying() {
        let executor = ScriptedStatus::new(vec![page(CommandStatus::Pending)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poller(executor.clone())
            .poll(&mut invocation(), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Cancelled);
        assert_eq!(executor.queries(), 0);
    }

    #[test]
    fn extraction_modes() {
        let output = "\n  first line  \nsecond line\n";
        assert_eq!(ResultExtraction::FirstLine.extract(output), "first line");
        assert_eq!(
            ResultExtraction::FullOutput.extract(output),
            "first line  \nsecond line"
        );
        assert_eq!(ResultExtraction::FirstLine.extract("   "), "");
    }
}

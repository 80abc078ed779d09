//! Bounded retry with a fixed delay.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Default number of additional attempts after the first call.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default wait between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Retries an operation while its error is classified as transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first; `0` disables retrying.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Call `operation` until it succeeds, fails with an error `is_transient`
    /// rejects, or the attempts run out.
    ///
    /// Exhaustion returns the last error unchanged. A non-transient error is
    /// returned immediately without waiting, and so is the last transient
    /// error once `cancel` fires during a wait.
    pub async fn run<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        is_transient: C,
        cancel: &CancellationToken,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: Display,
    {
        let mut state = RetryState::new(self);

        loop {
            state.attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) && state.can_retry() => {
                    warn!(
                        attempt = state.attempt,
                        max_attempts = state.max_attempts,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(err),
                        _ = tokio::time::sleep(state.delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Attempt bookkeeping for one retry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_retries.saturating_add(1),
            delay: policy.delay,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

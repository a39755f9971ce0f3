//! Bounded fixed-delay retry

use std::time::Duration;

use tracing::{debug, instrument, warn};
use ztpflow_actions::{ActionExecutor, ActionOutcome, ActionParams};

/// How often and how patiently an action is retried
///
/// Every attempt is a fresh invocation; the outcome of the last attempt is
/// the outcome of the whole call, whatever its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// `max_attempts` of 0 still performs one attempt
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            timeout: None,
        }
    }

    /// Bound each attempt; an attempt that overruns counts as a soft failure
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attempts actually performed at most
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Invoke `action` until it succeeds or attempts run out
    pub async fn execute(
        &self,
        executor: &dyn ActionExecutor,
        action: &str,
        host: Option<&str>,
        params: &ActionParams,
    ) -> ActionOutcome {
        self.execute_observed(executor, action, host, params, |_, _| {})
            .await
    }

    /// Like [`execute`](Self::execute), calling `observer` after every attempt
    #[instrument(skip(self, executor, params, observer))]
    pub async fn execute_observed<F>(
        &self,
        executor: &dyn ActionExecutor,
        action: &str,
        host: Option<&str>,
        params: &ActionParams,
        mut observer: F,
    ) -> ActionOutcome
    where
        F: FnMut(u32, &ActionOutcome) + Send,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            let mut outcome = self
                .attempt(executor, action, host, params)
                .await
                .with_attempts(attempt);
            if outcome.host.is_none() {
                outcome.host = host.map(ToString::to_string);
            }
            observer(attempt, &outcome);

            if outcome.success() {
                debug!(attempt, "action succeeded");
                return outcome;
            }
            if attempt >= attempts {
                warn!(attempt, status = %outcome.status, "attempts exhausted");
                return outcome;
            }

            warn!(
                attempt,
                max_attempts = attempts,
                status = %outcome.status,
                delay_secs = self.delay.as_secs_f64(),
                "attempt failed, retrying"
            );
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        executor: &dyn ActionExecutor,
        action: &str,
        host: Option<&str>,
        params: &ActionParams,
    ) -> ActionOutcome {
        let invocation = executor.invoke(action, host, params);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .unwrap_or_else(|_| {
                    ActionOutcome::soft_failure(vec![format!(
                        "attempt timed out after {}s",
                        limit.as_secs_f64()
                    )])
                }),
            None => invocation.await,
        }
    }
}

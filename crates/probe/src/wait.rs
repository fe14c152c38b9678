//! Condition-based waiting.
//!
//! Every UI synchronization point in the harness goes through [`wait_for`]:
//! poll a check, return as soon as it reports [`Observation::Ready`], give up
//! with [`ProbeError::Timeout`] once the budget is spent. There are no fixed
//! sleeps.
//!
//! Timing guarantees, with `T` the timeout and `P` the poll interval:
//!
//! - once the condition holds, the wait returns within one poll interval
//!   (plus the cost of one check);
//! - on failure it returns within `T + P`: the last sleep is clamped to the
//!   time remaining, and a check still running then is abandoned once
//!   `remaining + P` has passed.

use crate::config::Timeouts;
use crate::result::{ProbeError, ProbeResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Options for asynchronous state changes (follow, favorite, comment)
    #[must_use]
    pub const fn state_change(timeouts: &Timeouts) -> Self {
        Self {
            timeout_ms: timeouts.state_change_ms,
            poll_interval_ms: timeouts.poll_interval_ms,
        }
    }

    /// Options for page loads and route changes
    #[must_use]
    pub const fn page_load(timeouts: &Timeouts) -> Self {
        Self {
            timeout_ms: timeouts.page_load_ms,
            poll_interval_ms: timeouts.poll_interval_ms,
        }
    }

    /// Options for elements expected to be present already
    #[must_use]
    pub const fn implicit(timeouts: &Timeouts) -> Self {
        Self {
            timeout_ms: timeouts.implicit_wait_ms,
            poll_interval_ms: timeouts.poll_interval_ms,
        }
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation<T> {
    /// Condition holds; carries the value the wait resolves to
    Ready(T),
    /// Condition does not hold yet; carries a description of what was seen
    Pending(String),
}

impl Observation<()> {
    /// Ready if `holds`, else pending with `observed`
    pub fn when(holds: bool, observed: impl Into<String>) -> Self {
        if holds {
            Self::Ready(())
        } else {
            Self::Pending(observed.into())
        }
    }
}

impl<T> Observation<T> {
    /// Whether the condition held
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Poll `check` until it is ready or `options.timeout_ms` elapses.
///
/// Errors returned by `check` count as "not yet" (an element may be
/// mid-render); the most recent one is reported as the last observed state if
/// the wait times out. A single check may run for at most the time remaining
/// plus one poll interval.
pub async fn wait_for<T, F, Fut>(
    description: &str,
    options: &WaitOptions,
    mut check: F,
) -> ProbeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<Observation<T>>>,
{
    let start = Instant::now();
    let timeout = options.timeout();
    let poll = options.poll_interval().max(Duration::from_millis(1));
    let mut last_observed = String::from("nothing observed");
    let mut polls = 0_u32;

    loop {
        polls += 1;
        let budget = timeout.saturating_sub(start.elapsed()) + poll;
        match tokio::time::timeout(budget, check()).await {
            Err(_) => {
                last_observed = format!("check still running after {}ms", budget.as_millis());
            }
            Ok(Ok(Observation::Ready(value))) => {
                tracing::debug!(
                    waited_for = description,
                    polls,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "condition met"
                );
                return Ok(value);
            }
            Ok(Ok(Observation::Pending(observed))) => last_observed = observed,
            Ok(Err(e)) => last_observed = format!("check failed: {e}"),
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            tracing::debug!(waited_for = description, polls, %last_observed, "wait timed out");
            return Err(ProbeError::Timeout {
                waited_for: description.to_string(),
                timeout_ms: options.timeout_ms,
                last_observed,
            });
        }
        tokio::time::sleep(poll.min(timeout - elapsed)).await;
    }
}

/// [`wait_for`] over a boolean predicate.
pub async fn wait_until<F, Fut>(
    description: &str,
    options: &WaitOptions,
    mut predicate: F,
) -> ProbeResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<bool>>,
{
    wait_for(description, options, || {
        let fut = predicate();
        async move {
            let holds = fut.await?;
            Ok(Observation::when(holds, "predicate false"))
        }
    })
    .await
}

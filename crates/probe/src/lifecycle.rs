//! Per-test state machine.
//!
//! ```text
//! Created ──start──▶ Running ──┬──▶ Passed
//!                              ├──▶ Failed   (harness error, failed check, panic)
//!                              └──▶ Skipped  (precondition could not be established)
//! ```
//!
//! Terminal states are final. [`run_test`] drives one async test body through
//! the machine and always yields a [`TestReport`]; a panicking `assert!` in
//! the body is caught and recorded as `Failed`.

use crate::browser::BrowserSession;
use crate::reporter::{Reporter, TestReport, TestStatus};
use crate::result::{ProbeError, ProbeResult};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Where a test is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestState {
    /// Not started
    Created,
    /// Body executing
    Running,
    /// Finished, all checks held
    Passed,
    /// Finished with an error or failed check
    Failed,
    /// Finished without running to completion on purpose
    Skipped,
}

impl TestState {
    /// Whether no further transition is allowed
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Skipped)
    }

    const fn from_status(status: TestStatus) -> Self {
        match status {
            TestStatus::Passed => Self::Passed,
            TestStatus::Failed => Self::Failed,
            TestStatus::Skipped => Self::Skipped,
        }
    }
}

#[derive(Debug, Default)]
struct ContextState {
    info: Vec<String>,
    screenshot: Option<Vec<u8>>,
}

/// Handle given to a test body for recording its trail.
///
/// Clones share the same trail.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    state: Arc<Mutex<ContextState>>,
}

impl TestContext {
    /// Append a line to the info trail
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "info");
        self.state.lock().info.push(message);
    }

    /// Record a completed step
    pub fn pass_step(&self, step: impl AsRef<str>) {
        self.info(format!("PASS: {}", step.as_ref()));
    }

    /// Fail with [`ProbeError::AssertionFailed`] unless `condition` holds
    pub fn check(&self, condition: bool, message: impl Into<String>) -> ProbeResult<()> {
        let message = message.into();
        if condition {
            self.pass_step(&message);
            Ok(())
        } else {
            self.info(format!("FAIL: {message}"));
            Err(ProbeError::assertion(message))
        }
    }

    /// Fail unless `actual == expected`
    pub fn check_eq<T>(&self, actual: &T, expected: &T, what: &str) -> ProbeResult<()>
    where
        T: PartialEq + std::fmt::Debug + ?Sized,
    {
        self.check(
            actual == expected,
            if actual == expected {
                format!("{what} == {expected:?}")
            } else {
                format!("{what}: expected {expected:?}, got {actual:?}")
            },
        )
    }

    /// End the test as skipped
    pub fn skip<T>(&self, reason: impl Into<String>) -> ProbeResult<T> {
        let reason = reason.into();
        self.info(format!("SKIP: {reason}"));
        Err(ProbeError::skipped(reason))
    }

    /// Turn a timed-out precondition into a skip; other errors pass through
    pub fn skip_on_timeout<T>(&self, result: ProbeResult<T>, precondition: &str) -> ProbeResult<T> {
        match result {
            Err(e) if e.is_timeout() => self.skip(format!("{precondition}: {e}")),
            other => other,
        }
    }

    /// Keep a PNG for the report
    pub fn attach_screenshot(&self, png: Vec<u8>) {
        self.state.lock().screenshot = Some(png);
    }

    /// Info trail so far
    #[must_use]
    pub fn trail(&self) -> Vec<String> {
        self.state.lock().info.clone()
    }

    fn take_screenshot(&self) -> Option<Vec<u8>> {
        self.state.lock().screenshot.take()
    }
}

/// One test's run through the state machine
#[derive(Debug)]
pub struct TestLifecycle {
    name: String,
    state: TestState,
    started_at: Option<DateTime<Utc>>,
    context: TestContext,
}

impl TestLifecycle {
    /// Test in `Created`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TestState::Created,
            started_at: None,
            context: TestContext::default(),
        }
    }

    /// Test name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> TestState {
        self.state
    }

    /// Context for the test body
    #[must_use]
    pub fn context(&self) -> TestContext {
        self.context.clone()
    }

    /// `Created → Running`
    pub fn start(&mut self) -> ProbeResult<()> {
        if self.state != TestState::Created {
            return Err(ProbeError::invalid_state(format!(
                "test '{}' cannot start from {:?}",
                self.name, self.state
            )));
        }
        self.state = TestState::Running;
        self.started_at = Some(Utc::now());
        tracing::info!(test = %self.name, "test started");
        Ok(())
    }

    /// `Running → Passed | Failed | Skipped`
    pub fn finish(&mut self, status: TestStatus, message: Option<String>) -> ProbeResult<TestReport> {
        if self.state != TestState::Running {
            return Err(ProbeError::invalid_state(format!(
                "test '{}' cannot finish from {:?}",
                self.name, self.state
            )));
        }
        self.state = TestState::from_status(status);
        let finished_at = Utc::now();
        let started_at = self.started_at.unwrap_or(finished_at);
        let mut report = match (status, message) {
            (TestStatus::Passed, _) => TestReport::passed(&self.name),
            (TestStatus::Failed, m) => TestReport::failed(&self.name, m.unwrap_or_default()),
            (TestStatus::Skipped, m) => TestReport::skipped(&self.name, m.unwrap_or_default()),
        }
        .with_timing(started_at, finished_at)
        .with_info(self.context.trail());
        if let Some(png) = self.context.take_screenshot() {
            report = report.with_screenshot(png);
        }
        match status {
            TestStatus::Failed => tracing::warn!(
                test = %self.name,
                duration_ms = report.duration_ms,
                message = report.message.as_deref().unwrap_or(""),
                "test failed"
            ),
            _ => tracing::info!(
                test = %self.name,
                status = status.label(),
                duration_ms = report.duration_ms,
                "test finished"
            ),
        }
        Ok(report)
    }

    /// Map a body's outcome onto the terminal state
    pub fn finish_with(&mut self, outcome: &ProbeResult<()>) -> ProbeResult<TestReport> {
        match outcome {
            Ok(()) => self.finish(TestStatus::Passed, None),
            Err(ProbeError::Skipped { reason }) => {
                self.finish(TestStatus::Skipped, Some(reason.clone()))
            }
            Err(e) => self.finish(TestStatus::Failed, Some(e.to_string())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "test panicked".to_string())
}

async fn execute<F, Fut>(
    name: &str,
    body: F,
    browser: Option<&BrowserSession>,
) -> (TestReport, Option<ProbeError>)
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = ProbeResult<()>>,
{
    let mut lifecycle = TestLifecycle::new(name);
    if let Err(e) = lifecycle.start() {
        return (TestReport::failed(name, e.to_string()), Some(e));
    }
    let context = lifecycle.context();

    let outcome = match AssertUnwindSafe(body(context.clone())).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ProbeError::assertion(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    };

    if outcome.as_ref().is_err_and(|e| !matches!(e, ProbeError::Skipped { .. })) {
        if let Some(browser) = browser {
            match browser.screenshot().await {
                Ok(png) => context.attach_screenshot(png),
                Err(e) => tracing::debug!(error = %e, "no failure screenshot"),
            }
        }
    }

    let report = lifecycle
        .finish_with(&outcome)
        .unwrap_or_else(|e| TestReport::failed(name, e.to_string()));
    (report, outcome.err())
}

/// Run one async test body to a terminal state.
///
/// Harness errors and failed checks yield `Failed`, [`ProbeError::Skipped`]
/// yields `Skipped`, and a panic in the body yields `Failed` with the panic
/// message.
pub async fn run_test<F, Fut>(name: &str, body: F) -> TestReport
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = ProbeResult<()>>,
{
    execute(name, body, None).await.0
}

/// [`run_test`] that captures a screenshot from `browser` when the test fails
pub async fn run_ui_test<F, Fut>(name: &str, browser: &BrowserSession, body: F) -> TestReport
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = ProbeResult<()>>,
{
    execute(name, body, Some(browser)).await.0
}

/// Runs tests into a shared [`Reporter`].
///
/// A [`ProbeError::Config`] from any test is recorded and then returned, so
/// the caller can abort the run with `?`.
#[derive(Debug, Clone, Default)]
pub struct Suite {
    reporter: Reporter,
}

impl Suite {
    /// Suite recording into `reporter`
    #[must_use]
    pub const fn new(reporter: Reporter) -> Self {
        Self { reporter }
    }

    /// Reporter handle
    #[must_use]
    pub const fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Run and record one test
    pub async fn run<F, Fut>(&self, name: &str, body: F) -> ProbeResult<TestStatus>
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = ProbeResult<()>>,
    {
        self.record(execute(name, body, None).await)
    }

    /// Run and record one browser test, screenshotting on failure
    pub async fn run_ui<F, Fut>(
        &self,
        name: &str,
        browser: &BrowserSession,
        body: F,
    ) -> ProbeResult<TestStatus>
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = ProbeResult<()>>,
    {
        self.record(execute(name, body, Some(browser)).await)
    }

    fn record(&self, (report, error): (TestReport, Option<ProbeError>)) -> ProbeResult<TestStatus> {
        let status = report.status;
        self.reporter.record(report);
        match error {
            Some(e) if e.is_fatal() => Err(e),
            _ => Ok(status),
        }
    }
}

//! Reporter - per-run aggregation of test outcomes.
//!
//! Every test execution ends in exactly one [`TestReport`]. The [`Reporter`]
//! is the only state shared between concurrently running tests: it is a
//! cheap-to-clone handle over a locked list, and [`Reporter::flush`] writes
//! one HTML and one JSON artifact per run, plus any failure screenshots.
//!
//! ```text
//! conduit-probe-report.html
//! conduit-probe-report.json
//! screenshots/<test>_<timestamp>.png
//! ```

use crate::browser::escape_html;
use crate::result::ProbeResult;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// HTML artifact name
pub const HTML_REPORT: &str = "conduit-probe-report.html";
/// JSON artifact name
pub const JSON_REPORT: &str = "conduit-probe-report.json";
/// Screenshot directory under the report dir
pub const SCREENSHOT_DIR: &str = "screenshots";

/// Terminal status of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// All checks held
    Passed,
    /// A check failed or the harness raised an error
    Failed,
    /// A precondition could not be established
    Skipped,
}

impl TestStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if status is skipped
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Upper-case label for summaries
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

/// Outcome of one test execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    /// Test name
    pub name: String,
    /// Terminal status
    pub status: TestStatus,
    /// Failure or skip reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Info trail recorded while the test ran
    #[serde(default)]
    pub info: Vec<String>,
    /// When the test entered `Running`
    pub started_at: DateTime<Utc>,
    /// When the test reached its terminal state
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// PNG captured on failure
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
    /// Where the screenshot was written by [`Reporter::flush`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,
}

impl TestReport {
    fn new(name: impl Into<String>, status: TestStatus, message: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            status,
            message,
            info: Vec::new(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            screenshot: None,
            screenshot_path: None,
        }
    }

    /// Create a passing report
    #[must_use]
    pub fn passed(name: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Passed, None)
    }

    /// Create a failing report
    #[must_use]
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Failed, Some(message.into()))
    }

    /// Create a skipped report
    #[must_use]
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Skipped, Some(reason.into()))
    }

    /// Set start and finish; derives the duration
    #[must_use]
    pub fn with_timing(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.finished_at = finished_at;
        self.duration_ms = u64::try_from((finished_at - started_at).num_milliseconds()).unwrap_or(0);
        self
    }

    /// Attach the info trail
    #[must_use]
    pub fn with_info(mut self, info: Vec<String>) -> Self {
        self.info = info;
        self
    }

    /// Attach a failure screenshot
    #[must_use]
    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    /// File name for this report's screenshot
    #[must_use]
    pub fn screenshot_file_name(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{stem}_{}.png", self.finished_at.format("%Y%m%d_%H%M%S"))
    }
}

/// Paths written by [`Reporter::flush`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    /// HTML report
    pub html: PathBuf,
    /// JSON report
    pub json: PathBuf,
    /// Screenshots, one per failed test that captured one
    pub screenshots: Vec<PathBuf>,
}

#[derive(Debug)]
struct ReporterState {
    suite_name: String,
    started_at: DateTime<Utc>,
    results: Vec<TestReport>,
}

/// Thread-safe collector of [`TestReport`]s for one run
#[derive(Debug, Clone)]
pub struct Reporter {
    state: Arc<Mutex<ReporterState>>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    suite: &'a str,
    started_at: DateTime<Utc>,
    total: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
    results: &'a [TestReport],
}

impl Reporter {
    /// Create new reporter
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ReporterState {
                suite_name: "Conduit".to_string(),
                started_at: Utc::now(),
                results: Vec::new(),
            })),
        }
    }

    /// Set suite name
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.state.lock().suite_name = name.into();
        self
    }

    /// Record one terminal outcome
    pub fn record(&self, report: TestReport) {
        tracing::debug!(test = %report.name, status = report.status.label(), "recorded");
        self.state.lock().results.push(report);
    }

    /// Snapshot of every recorded report
    #[must_use]
    pub fn results(&self) -> Vec<TestReport> {
        self.state.lock().results.clone()
    }

    fn count(&self, status: TestStatus) -> usize {
        self.state
            .lock()
            .results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    /// Get number of passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    /// Get number of failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    /// Get number of skipped tests
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    /// Get total test count
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.state.lock().results.len()
    }

    /// Passed over executed (skips excluded), 1.0 when nothing ran
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        let executed = self.total_count() - self.skipped_count();
        if executed == 0 {
            return 1.0;
        }
        self.passed_count() as f64 / executed as f64
    }

    /// Whether no test failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Failed reports
    #[must_use]
    pub fn failures(&self) -> Vec<TestReport> {
        self.state
            .lock()
            .results
            .iter()
            .filter(|r| r.status.is_failed())
            .cloned()
            .collect()
    }

    /// Sum of test durations
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        self.state.lock().results.iter().map(|r| r.duration_ms).sum()
    }

    /// Generate summary string
    #[must_use]
    pub fn summary(&self) -> String {
        let name = self.state.lock().suite_name.clone();
        format!(
            "{name}: {}/{} passed, {} failed, {} skipped",
            self.passed_count(),
            self.total_count(),
            self.failed_count(),
            self.skipped_count()
        )
    }

    /// Standalone HTML page: a counts header and one table row per test.
    /// Names, messages and info lines are escaped.
    #[must_use]
    pub fn render_html(&self) -> String {
        const STYLE: &str = "\
body{font:14px/1.4 system-ui,sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;width:100%}\
td,th{border-bottom:1px solid #ddd;padding:6px 8px;text-align:left;vertical-align:top}\
tr.passed td.status{color:#2e7d32}\
tr.failed td.status{color:#c62828;font-weight:bold}\
tr.skipped td.status{color:#ef6c00}\
pre{margin:0;white-space:pre-wrap}\
ul{margin:4px 0 0;padding-left:1.2em;color:#666}\
img{max-width:480px;margin-top:4px}";

        let state = self.state.lock();
        let count = |status: TestStatus| state.results.iter().filter(|r| r.status == status).count();

        let mut html = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{name}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
             <h1>{name}</h1>\n<p>Started {started}: {passed} passed, {failed} failed, {skipped} skipped</p>\n\
             <table>\n<tr><th>Test</th><th>Status</th><th>Duration</th><th>Details</th></tr>\n",
            name = escape_html(&state.suite_name),
            started = state.started_at.to_rfc3339(),
            passed = count(TestStatus::Passed),
            failed = count(TestStatus::Failed),
            skipped = count(TestStatus::Skipped),
        );

        for result in &state.results {
            let class = match result.status {
                TestStatus::Passed => "passed",
                TestStatus::Failed => "failed",
                TestStatus::Skipped => "skipped",
            };
            html.push_str(&format!(
                "<tr class=\"{class}\"><td>{}</td><td class=\"status\">{}</td><td>{}ms</td><td>",
                escape_html(&result.name),
                result.status.label(),
                result.duration_ms,
            ));
            if let Some(message) = &result.message {
                html.push_str(&format!("<pre>{}</pre>", escape_html(message)));
            }
            if !result.info.is_empty() {
                html.push_str("<ul>");
                for line in &result.info {
                    html.push_str(&format!("<li>{}</li>", escape_html(line)));
                }
                html.push_str("</ul>");
            }
            if let Some(path) = &result.screenshot_path {
                html.push_str(&format!(
                    "<img alt=\"screenshot\" src=\"{}\">",
                    escape_html(&path.to_string_lossy())
                ));
            }
            html.push_str("</td></tr>\n");
        }

        html.push_str("</table>\n</body>\n</html>\n");
        html
    }

    /// Render JSON report content
    pub fn render_json(&self) -> ProbeResult<String> {
        let state = self.state.lock();
        let passed = state.results.iter().filter(|r| r.status.is_passed()).count();
        let failed = state.results.iter().filter(|r| r.status.is_failed()).count();
        let report = JsonReport {
            suite: &state.suite_name,
            started_at: state.started_at,
            total: state.results.len(),
            passed,
            failed,
            skipped: state.results.len() - passed - failed,
            results: &state.results,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    /// Write screenshots, then the HTML and JSON reports, into `dir`
    pub fn flush(&self, dir: &Path) -> ProbeResult<ReportArtifacts> {
        std::fs::create_dir_all(dir)?;
        let mut screenshots = Vec::new();
        {
            let mut state = self.state.lock();
            for result in &mut state.results {
                let Some(png) = &result.screenshot else {
                    continue;
                };
                let file_name = result.screenshot_file_name();
                let shots = dir.join(SCREENSHOT_DIR);
                std::fs::create_dir_all(&shots)?;
                let path = shots.join(&file_name);
                std::fs::write(&path, png)?;
                result.screenshot_path = Some(Path::new(SCREENSHOT_DIR).join(file_name));
                screenshots.push(path);
            }
        }

        let html = dir.join(HTML_REPORT);
        std::fs::write(&html, self.render_html())?;
        let json = dir.join(JSON_REPORT);
        std::fs::write(&json, self.render_json()?)?;
        tracing::info!(dir = %dir.display(), summary = %self.summary(), "report written");
        Ok(ReportArtifacts {
            html,
            json,
            screenshots,
        })
    }
}

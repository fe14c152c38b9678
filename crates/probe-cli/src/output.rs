//! Terminal output: progress bar, per-scenario lines, run summary

use conduit_probe::{TestReport, TestStatus};
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Line prefix for one kind of message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Pass,
    Fail,
    Skip,
    Note,
}

impl Mark {
    const fn plain(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
            Self::Note => "INFO",
        }
    }

    fn colored(self) -> String {
        let glyph = match self {
            Self::Pass => style("✓").green(),
            Self::Fail => style("✗").red(),
            Self::Skip => style("⚠").yellow(),
            Self::Note => style("ℹ").blue(),
        };
        glyph.bold().to_string()
    }

    /// Failures are printed even when quiet
    const fn shown_when_quiet(self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl From<TestStatus> for Mark {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Passed => Self::Pass,
            TestStatus::Failed => Self::Fail,
            TestStatus::Skipped => Self::Skip,
        }
    }
}

/// Progress and result printer for one smoke run, writing to stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Only failures and the final verdict
    pub quiet: bool,
}

impl ProgressReporter {
    /// Printer on stderr
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            bar: None,
            use_color,
            quiet,
        }
    }

    /// Show a bar over `scenarios` steps; no-op when quiet or not a terminal
    pub fn start_progress(&mut self, scenarios: u64, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }
        let style = ProgressStyle::with_template("{spinner:.cyan} {pos}/{len} scenarios {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bar = ProgressBar::new(scenarios).with_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message(message.to_string());
        self.bar = Some(bar);
    }

    /// Name the running scenario next to the bar
    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    /// One finished scenario: `✓ name (12ms)` or `✗ name (40ms): reason`
    pub fn record(&self, report: &TestReport) {
        let mut line = format!("{} ({}ms)", report.name, report.duration_ms);
        if let Some(message) = &report.message {
            line.push_str(": ");
            line.push_str(message);
        }
        self.print(report.status.into(), &line);
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    /// Remove the bar
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Informational line
    pub fn info(&self, message: &str) {
        self.print(Mark::Note, message);
    }

    /// Heading printed before the scenarios
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let heading = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        self.emit(&heading);
    }

    fn print(&self, mark: Mark, message: &str) {
        if self.quiet && !mark.shown_when_quiet() {
            return;
        }
        let prefix = if self.use_color {
            mark.colored()
        } else {
            mark.plain().to_string()
        };
        self.emit(&format!("{prefix} {message}"));
    }

    fn emit(&self, line: &str) {
        // Print above the bar so it keeps redrawing on the last row
        match &self.bar {
            Some(bar) => bar.println(line),
            None => {
                let _ = self.term.write_line(line);
            }
        }
    }
}

/// `PASSED 5 scenarios in 1.20s (4 passed, 0 failed, 1 skipped)`
#[must_use]
pub fn summary_line(
    passed: usize,
    failed: usize,
    skipped: usize,
    duration: Duration,
    use_color: bool,
) -> String {
    let total = passed + failed + skipped;
    let verdict = if failed > 0 { "FAILED" } else { "PASSED" };
    let paint = |text: String, painter: Style| {
        if use_color {
            painter.apply_to(text).to_string()
        } else {
            text
        }
    };

    let verdict = paint(
        verdict.to_string(),
        if failed > 0 {
            Style::new().red().bold()
        } else {
            Style::new().green().bold()
        },
    );
    let failed_count = if failed > 0 {
        paint(failed.to_string(), Style::new().red().bold())
    } else {
        failed.to_string()
    };
    format!(
        "{verdict} {total} scenarios in {:.2}s ({} passed, {failed_count} failed, {} skipped)",
        duration.as_secs_f64(),
        paint(passed.to_string(), Style::new().green()),
        paint(skipped.to_string(), Style::new().yellow()),
    )
}

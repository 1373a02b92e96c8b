//! Output formatting and progress reporting

use console::{style, Style, Term};
use flowprobe::{Outcome, ScenarioReport, TraceLine};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for scenario runs
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// Print every trace line, not only failures
    pub verbose: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
            verbose: false,
        }
    }

    /// Print passing steps as well
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn write_line(&self, line: &str) {
        match self.progress_bar {
            Some(ref pb) => pb.println(line),
            None => {
                let _ = self.term.write_line(line);
            }
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, paint: fn(&str) -> String, message: &str) {
        let prefix = if self.use_color {
            paint(symbol)
        } else {
            plain.to_string()
        };
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.prefixed("✓", "PASS", |s| style(s).green().bold().to_string(), message);
    }

    /// Print a failure message; shown even in quiet mode
    pub fn failure(&self, message: &str) {
        self.prefixed("✗", "FAIL", |s| style(s).red().bold().to_string(), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.prefixed("⚠", "WARN", |s| style(s).yellow().bold().to_string(), message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.prefixed("ℹ", "INFO", |s| style(s).blue().bold().to_string(), message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        self.write_line("");
        self.write_line(&styled);
    }

    /// Print one finished scenario: a status line, then its failing steps
    /// (every step when verbose), artifacts and skipped steps
    pub fn scenario(&self, report: &ScenarioReport) {
        let status = format!(
            "{} ({} steps, {}ms)",
            report.scenario,
            report.lines.len(),
            report.duration_ms
        );
        if report.passed() {
            self.success(&status);
        } else {
            self.failure(&status);
        }

        for line in &report.lines {
            if line.outcome.is_pass() && !self.verbose {
                continue;
            }
            let text = render_line(line);
            match (&line.outcome, line.optional) {
                (Outcome::Pass, _) => self.info(&text),
                (_, true) => self.warning(&text),
                _ => self.failure(&text),
            }
        }
        if !report.skipped.is_empty() && !self.quiet {
            self.write_line(&format!("    skipped: {}", report.skipped.join(", ")));
        }
        for path in &report.artifacts {
            self.info(&format!("artifact: {}", path.display()));
        }
        if let Some(ref teardown) = report.teardown_error {
            self.warning(&format!("browser release failed: {teardown}"));
        }
    }

    /// Print run summary
    pub fn summary(&self, passed: usize, failed: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }

        let total = passed + failed;
        let duration_secs = duration.as_secs_f64();
        self.write_line("");

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };
            self.write_line(&format!(
                "{status} {total} scenarios in {duration_secs:.2}s ({} passed, {} failed)",
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            self.write_line(&format!(
                "{status} {total} scenarios in {duration_secs:.2}s ({passed} passed, {failed} failed)"
            ));
        }
    }
}

/// `phase / step: expectation -> outcome [observed]`
fn render_line(line: &TraceLine) -> String {
    let mut text = format!(
        "  {} / {}: {} -> {}",
        line.phase, line.step, line.expectation, line.outcome
    );
    if let Some(ref observed) = line.observed {
        text.push_str(&format!(" (observed {observed:?})"));
    }
    text
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flowprobe::FailureReason;

    fn line(outcome: Outcome, observed: Option<&str>) -> TraceLine {
        TraceLine {
            phase: "smart toggle".to_string(),
            step: "initial aria-expanded".to_string(),
            expectation: "aria-expanded = \"false\"".to_string(),
            observed: observed.map(str::to_string),
            outcome,
            elapsed_ms: 3,
            optional: false,
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_render_line_with_observation() {
            let text = render_line(&line(Outcome::Pass, Some("false")));
            assert!(text.contains("smart toggle / initial aria-expanded"));
            assert!(text.ends_with("-> pass (observed \"false\")"));
        }

        #[test]
        fn test_render_line_not_found() {
            let text = render_line(&line(
                Outcome::NotFound {
                    locator: "role=button".to_string(),
                },
                None,
            ));
            assert!(text.ends_with("not found: role=button"));
        }
    }

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
            assert!(!reporter.verbose);
        }

        #[test]
        fn test_scenario_output_does_not_panic() {
            let reporter = ProgressReporter::new(false, false).with_verbose(true);
            let mut report = ScenarioReport::new("accessibility");
            report.push(line(Outcome::Pass, Some("false")));
            report.push(line(
                Outcome::Fail(FailureReason::Empty),
                Some(""),
            ));
            report.skipped.push("error alert/alert shown".to_string());
            reporter.scenario(&report);
            reporter.summary(0, 1, Duration::from_millis(1200));
        }

        #[test]
        fn test_quiet_mode_suppresses_output() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_progress(4, "scenarios");
            assert!(reporter.progress_bar.is_none());
            reporter.success("hidden");
            reporter.warning("hidden");
            reporter.info("hidden");
            reporter.header("hidden");
            reporter.failure("shown");
        }
    }
}

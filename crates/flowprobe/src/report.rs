//! Structured scenario results.
//!
//! The engine appends one [`TraceLine`] per executed step. Rendering is
//! separate from verification: callers get a [`ScenarioReport`] and decide
//! whether to print text, write JSON or compute an exit status.

use crate::assertion::Outcome;
use crate::driver::ConsoleMessage;
use crate::result::ProbeResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use uuid::Uuid;

/// One executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceLine {
    /// Phase the step belongs to
    pub phase: String,
    /// Step name
    pub step: String,
    /// What was expected
    pub expectation: String,
    /// What was observed
    pub observed: Option<String>,
    /// Outcome
    pub outcome: Outcome,
    /// Time spent on the step
    pub elapsed_ms: u64,
    /// Failure does not fail the scenario
    pub optional: bool,
}

impl TraceLine {
    /// Whether this line fails the scenario
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.optional && !self.outcome.is_pass()
    }

    fn marker(&self) -> &'static str {
        match (&self.outcome, self.optional) {
            (Outcome::Pass, _) => "PASS",
            (_, true) => "WARN",
            (Outcome::NotFound { .. }, false) => "MISS",
            (Outcome::Fail(_), false) => "FAIL",
        }
    }
}

/// Result of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Scenario name
    pub scenario: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Wall time
    pub duration_ms: u64,
    /// Executed steps in order
    pub lines: Vec<TraceLine>,
    /// Steps skipped after a failure, as `phase/step`
    pub skipped: Vec<String>,
    /// Artifacts written
    pub artifacts: Vec<PathBuf>,
    /// Console output of the page
    pub console: Vec<ConsoleMessage>,
    /// Stopped early by a fatal or required-phase failure
    pub aborted: bool,
    /// Error while releasing the browser
    pub teardown_error: Option<String>,
}

impl ScenarioReport {
    /// Empty report starting now
    #[must_use]
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: scenario.into(),
            started_at: Utc::now(),
            duration_ms: 0,
            lines: Vec::new(),
            skipped: Vec::new(),
            artifacts: Vec::new(),
            console: Vec::new(),
            aborted: false,
            teardown_error: None,
        }
    }

    /// Append a trace line
    pub fn push(&mut self, line: TraceLine) {
        self.lines.push(line);
    }

    /// Whether every required assertion passed and nothing aborted
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.aborted && !self.lines.iter().any(TraceLine::is_failure)
    }

    /// Lines that fail the scenario
    #[must_use]
    pub fn failures(&self) -> Vec<&TraceLine> {
        self.lines.iter().filter(|l| l.is_failure()).collect()
    }

    /// Pretty JSON
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable trace
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "scenario {} (run {})", self.scenario, self.run_id);
        for line in &self.lines {
            let _ = write!(
                out,
                "  [{}] {} / {}: {}",
                line.marker(),
                line.phase,
                line.step,
                line.expectation
            );
            if let Some(observed) = &line.observed {
                let _ = write!(out, " | observed {observed:?}");
            }
            let _ = writeln!(out, " ({}ms)", line.elapsed_ms);
            if !line.outcome.is_pass() {
                let _ = writeln!(out, "         {}", line.outcome);
            }
        }
        for skipped in &self.skipped {
            let _ = writeln!(out, "  [SKIP] {skipped}");
        }
        for message in &self.console {
            let _ = writeln!(out, "  console {message}");
        }
        for artifact in &self.artifacts {
            let _ = writeln!(out, "  artifact {}", artifact.display());
        }
        if let Some(err) = &self.teardown_error {
            let _ = writeln!(out, "  teardown error: {err}");
        }
        let verdict = if self.passed() { "PASSED" } else { "FAILED" };
        let _ = writeln!(
            out,
            "{verdict} {} in {}ms{}",
            self.scenario,
            self.duration_ms,
            if self.aborted { " (aborted)" } else { "" }
        );
        out
    }
}

/// Results of several scenarios
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Reports in run order
    pub reports: Vec<ScenarioReport>,
}

impl RunSummary {
    /// Create an empty summary
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a report
    pub fn push(&mut self, report: ScenarioReport) {
        self.reports.push(report);
    }

    /// Number of passing scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    /// Number of failing scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.reports.len() - self.passed_count()
    }

    /// Whether every scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(ScenarioReport::passed)
    }

    /// Process exit status: 0 when everything passed, 1 otherwise
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_passed())
    }

    /// Pretty JSON
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::assertion::FailureReason;

    fn line(outcome: Outcome, optional: bool) -> TraceLine {
        TraceLine {
            phase: "ready".to_string(),
            step: "form visible".to_string(),
            expectation: "wait visible succeeds".to_string(),
            observed: None,
            outcome,
            elapsed_ms: 3,
            optional,
        }
    }

    #[test]
    fn test_empty_report_passes() {
        assert!(ScenarioReport::new("empty").passed());
    }

    #[test]
    fn test_optional_failure_does_not_fail() {
        let mut report = ScenarioReport::new("s");
        report.push(line(
            Outcome::Fail(FailureReason::Driver {
                message: "screenshot".to_string(),
            }),
            true,
        ));
        assert!(report.passed());
        assert!(report.failures().is_empty());
        assert!(report.render_text().contains("[WARN]"));
    }

    #[test]
    fn test_not_found_fails() {
        let mut report = ScenarioReport::new("s");
        report.push(line(Outcome::Pass, false));
        report.push(line(
            Outcome::NotFound {
                locator: "role=button[name=\"Add Task\"]".to_string(),
            },
            false,
        ));
        assert!(!report.passed());
        assert_eq!(report.failures().len(), 1);
        let text = report.render_text();
        assert!(text.contains("[MISS]"));
        assert!(text.contains("FAILED s"));
    }

    #[test]
    fn test_aborted_fails() {
        let mut report = ScenarioReport::new("s");
        report.aborted = true;
        assert!(!report.passed());
        assert!(report.render_text().contains("(aborted)"));
    }

    #[test]
    fn test_json_contains_outcome() {
        let mut report = ScenarioReport::new("s");
        report.push(line(Outcome::Pass, false));
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["scenario"], "s");
        assert_eq!(json["lines"][0]["outcome"]["outcome"], "pass");
    }

    #[test]
    fn test_summary_exit_code() {
        let mut summary = RunSummary::new();
        summary.push(ScenarioReport::new("ok"));
        assert_eq!(summary.exit_code(), 0);
        let mut bad = ScenarioReport::new("bad");
        bad.aborted = true;
        summary.push(bad);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.passed_count(), 1);
        assert_eq!(summary.failed_count(), 1);
    }
}

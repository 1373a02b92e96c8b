//! Scenario engine.
//!
//! Data flows strictly forward per scenario: bootstrap the session, run the
//! phases in order, capture a diagnostic artifact on every hard failure,
//! collect console output, release the page. The runner owns the driver for
//! the whole scenario and closes it exactly once on every exit path.

use crate::artifact::ArtifactStore;
use crate::assertion::{evaluate_expectation, hold_expectation, FailureReason, Outcome, Verdict};
use crate::config::HarnessConfig;
use crate::driver::PageDriver;
use crate::identity::Bootstrapper;
use crate::report::{RunSummary, ScenarioReport, TraceLine};
use crate::result::{ProbeError, ProbeResult};
use crate::step::{Action, Phase, Scenario, Step};
use crate::wait::{self, WaitOptions};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs scenarios against a [`PageDriver`]
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: HarnessConfig,
    artifacts: ArtifactStore,
}

/// How a step ended, from the engine's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Skip the rest of the phase
    StopPhase,
    /// Skip everything that remains
    Abort,
}

impl ScenarioRunner {
    /// Create a runner
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        let artifacts = ArtifactStore::new(config.artifact_dir.clone());
        Self { config, artifacts }
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    fn wait_options(&self, timeout_ms: Option<u64>) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(timeout_ms.unwrap_or(self.config.timeouts.action_ms))
            .with_poll_interval(self.config.timeouts.poll_interval_ms)
    }

    /// Run one scenario to completion. Consumes the driver; it is closed
    /// before this returns.
    pub async fn run<D: PageDriver>(&self, mut driver: D, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();
        let mut report = ScenarioReport::new(&scenario.name);
        info!(scenario = %scenario.name, run_id = %report.run_id, "scenario started");

        self.execute(&mut driver, scenario, &mut report).await;

        match driver.console_messages().await {
            Ok(messages) => {
                debug!(count = messages.len(), "console messages collected");
                report.console = messages;
            }
            Err(e) => warn!(error = %e, "could not collect console messages"),
        }
        if let Err(e) = driver.close().await {
            error!(error = %e, "failed to release browser");
            report.teardown_error = Some(e.to_string());
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            scenario = %scenario.name,
            passed = report.passed(),
            duration_ms = report.duration_ms,
            "scenario finished"
        );
        report
    }

    /// Run scenarios one after another, each on a freshly launched driver.
    /// `observe` sees every report as soon as its scenario finishes.
    pub async fn run_all<D, L, Fut, O>(
        &self,
        scenarios: &[Scenario],
        mut launch: L,
        mut observe: O,
    ) -> RunSummary
    where
        D: PageDriver,
        L: FnMut() -> Fut,
        Fut: Future<Output = ProbeResult<D>>,
        O: FnMut(&ScenarioReport),
    {
        let mut summary = RunSummary::new();
        for scenario in scenarios {
            let report = match launch().await {
                Ok(driver) => self.run(driver, scenario).await,
                Err(e) => {
                    error!(scenario = %scenario.name, error = %e, "browser launch failed");
                    launch_failure(scenario, &e)
                }
            };
            observe(&report);
            summary.push(report);
        }
        summary
    }

    async fn execute<D: PageDriver>(
        &self,
        driver: &mut D,
        scenario: &Scenario,
        report: &mut ScenarioReport,
    ) {
        let mut memo = BTreeMap::new();
        if self.open(driver, scenario, report).await == Flow::Abort {
            report.aborted = true;
            skip_phases(report, &scenario.phases);
            return;
        }
        for (index, phase) in scenario.phases.iter().enumerate() {
            match self.run_phase(driver, scenario, phase, &mut memo, report).await {
                Flow::Abort => {
                    warn!(phase = %phase.name, "stopping scenario");
                    report.aborted = true;
                    skip_phases(report, &scenario.phases[index + 1..]);
                    return;
                }
                Flow::StopPhase | Flow::Continue => {}
            }
        }
    }

    /// Seed the identity (or just navigate) to the entry path
    async fn open<D: PageDriver>(
        &self,
        driver: &mut D,
        scenario: &Scenario,
        report: &mut ScenarioReport,
    ) -> Flow {
        let url = self.config.url_for(&scenario.entry_path);
        let start = Instant::now();
        let (step, result) = if scenario.seed {
            let bootstrapper = Bootstrapper::new(self.config.seed_strategy);
            let result = bootstrapper.seed(driver, &self.config.identity, &url).await;
            ("seed session", result)
        } else {
            ("open", driver.navigate(&url).await)
        };
        let outcome = result
            .as_ref()
            .map_or_else(Outcome::from_error, |_| Outcome::Pass);
        report.push(TraceLine {
            phase: "bootstrap".to_string(),
            step: step.to_string(),
            expectation: format!("{url} loads"),
            observed: Some(url.clone()),
            outcome: outcome.clone(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            optional: false,
        });
        if result.is_err() {
            // Nothing can run without the entry page
            error!(%url, %outcome, "could not open application");
            self.capture(driver, scenario, &outcome, report).await;
            return Flow::Abort;
        }
        Flow::Continue
    }

    async fn run_phase<D: PageDriver>(
        &self,
        driver: &mut D,
        scenario: &Scenario,
        phase: &Phase,
        memo: &mut BTreeMap<String, String>,
        report: &mut ScenarioReport,
    ) -> Flow {
        debug!(phase = %phase.name, steps = phase.steps.len(), "phase started");
        for (index, step) in phase.steps.iter().enumerate() {
            let start = Instant::now();
            let (verdict, fatal) = self.run_step(driver, scenario, step, memo, report).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            let passed = verdict.outcome.is_pass();
            if passed {
                if let (Some(key), Some(observed)) = (&step.remember, &verdict.observed) {
                    memo.insert(key.clone(), observed.clone());
                }
                debug!(step = %step.name, elapsed_ms, "step passed");
            } else if step.optional {
                warn!(step = %step.name, outcome = %verdict.outcome, "optional step failed");
            } else {
                warn!(step = %step.name, outcome = %verdict.outcome, "step failed");
            }
            report.push(TraceLine {
                phase: phase.name.clone(),
                step: step.name.clone(),
                expectation: step.describe_expectation(),
                observed: verdict.observed.clone(),
                outcome: verdict.outcome.clone(),
                elapsed_ms,
                optional: step.optional,
            });
            if passed || step.optional {
                continue;
            }
            self.capture(driver, scenario, &verdict.outcome, report).await;
            if step.soft && !fatal {
                continue;
            }
            skip_steps(report, phase, &phase.steps[index + 1..]);
            return if fatal || phase.required {
                Flow::Abort
            } else {
                Flow::StopPhase
            };
        }
        Flow::Continue
    }

    /// Execute one step; returns the verdict and whether the failure is fatal
    async fn run_step<D: PageDriver>(
        &self,
        driver: &mut D,
        scenario: &Scenario,
        step: &Step,
        memo: &BTreeMap<String, String>,
        report: &mut ScenarioReport,
    ) -> (Verdict, bool) {
        let options = self.wait_options(step.timeout_ms);
        let start = Instant::now();
        let result = match (&step.action, &step.target) {
            (Action::Navigate(path), _) => {
                let url = self.config.url_for(path);
                driver.navigate(&url).await.map(|()| Some(url))
            }
            (Action::Settle(ms), _) => {
                wait::settle(*ms).await;
                Ok(None)
            }
            (Action::Screenshot(label), _) => self.checkpoint(&*driver, scenario, label, report).await,
            (action, Some(chain)) if action.is_read() => {
                let verdict = match step.hold_ms {
                    Some(window_ms) => {
                        let window = options.with_timeout(window_ms);
                        hold_expectation(&*driver, chain, action, &step.expect, memo, &window).await
                    }
                    None => {
                        evaluate_expectation(&*driver, chain, action, &step.expect, memo, &options)
                            .await
                    }
                };
                return (verdict, false);
            }
            (Action::WaitVisible, Some(chain)) => wait::wait_for_visible(&*driver, chain, &options)
                .await
                .map(|r| Some(r.locator.to_string())),
            (Action::WaitAttached, Some(chain)) => wait::wait_for_attached(&*driver, chain, &options)
                .await
                .map(|n| Some(n.to_string())),
            (action, Some(chain)) => {
                match wait::wait_for_resolution(&*driver, chain, &options).await {
                    Ok(resolved) => {
                        if resolved.used_fallback() {
                            info!(step = %step.name, locator = %resolved.locator, "resolved via fallback locator");
                        }
                        let done = match action {
                            Action::Click => driver.click(&resolved.locator).await,
                            Action::Fill(text) => driver.fill(&resolved.locator, text).await,
                            Action::Check => driver.check(&resolved.locator).await,
                            _ => Ok(()),
                        };
                        done.map(|()| Some(resolved.locator.to_string()))
                    }
                    Err(e) => Err(e),
                }
            }
            (action, None) => Err(ProbeError::config(format!(
                "step {:?} needs a target for {action}",
                step.name
            ))),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(observed) => (
                Verdict {
                    observed,
                    outcome: Outcome::Pass,
                    elapsed_ms,
                },
                false,
            ),
            Err(e) => (
                Verdict {
                    observed: None,
                    outcome: Outcome::from_error(&e),
                    elapsed_ms,
                },
                e.is_fatal(),
            ),
        }
    }

    /// Success-path screenshot, written only when checkpoints are enabled
    async fn checkpoint<D: PageDriver>(
        &self,
        driver: &D,
        scenario: &Scenario,
        label: &str,
        report: &mut ScenarioReport,
    ) -> ProbeResult<Option<String>> {
        if !self.config.checkpoint_screenshots {
            return Ok(Some("checkpoints disabled".to_string()));
        }
        let bytes = driver.screenshot().await?;
        let path = self.artifacts.write(&scenario.name, label, &bytes)?;
        let shown = path.display().to_string();
        report.artifacts.push(path);
        Ok(Some(shown))
    }

    /// Failure artifact; a capture error is logged, never raised
    async fn capture<D: PageDriver>(
        &self,
        driver: &D,
        scenario: &Scenario,
        outcome: &Outcome,
        report: &mut ScenarioReport,
    ) {
        let bytes = match driver.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failure screenshot unavailable");
                return;
            }
        };
        match self.artifacts.write(&scenario.name, outcome.kind(), &bytes) {
            Ok(path) => report.artifacts.push(path),
            Err(e) => warn!(error = %e, "failure artifact not written"),
        }
    }
}

fn skip_steps(report: &mut ScenarioReport, phase: &Phase, steps: &[Step]) {
    for step in steps {
        report.skipped.push(format!("{}/{}", phase.name, step.name));
    }
}

fn skip_phases(report: &mut ScenarioReport, phases: &[Phase]) {
    for phase in phases {
        skip_steps(report, phase, &phase.steps);
    }
}

fn launch_failure(scenario: &Scenario, err: &ProbeError) -> ScenarioReport {
    let mut report = ScenarioReport::new(&scenario.name);
    report.push(TraceLine {
        phase: "bootstrap".to_string(),
        step: "launch browser".to_string(),
        expectation: "browser starts".to_string(),
        observed: None,
        outcome: Outcome::Fail(FailureReason::Driver {
            message: err.to_string(),
        }),
        elapsed_ms: 0,
        optional: false,
    });
    report.aborted = true;
    skip_phases(&mut report, &scenario.phases);
    report
}

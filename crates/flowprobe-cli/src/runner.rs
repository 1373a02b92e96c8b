//! Scenario selection and execution

use crate::commands::{HarnessArgs, RunArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use flowprobe::{scenarios, HarnessConfig, RunSummary, Scenario};
use std::time::Instant;

/// Load the configuration file (if any), then apply flag and environment
/// overrides and validate the result
pub fn build_harness_config(args: &HarnessArgs) -> CliResult<HarnessConfig> {
    let mut config = match args.config {
        Some(ref path) => HarnessConfig::load(path).map_err(|e| {
            CliError::config(format!("cannot load {}: {e}", path.display()))
        })?,
        None => HarnessConfig::default(),
    };

    if let Some(ref origin) = args.origin {
        config = config.with_origin(origin.clone());
    }
    if let Some(ref dir) = args.artifact_dir {
        config = config.with_artifact_dir(dir.clone());
    }
    if args.headed {
        config.browser = config.browser.with_headless(false);
    }
    if args.no_sandbox {
        config.browser = config.browser.with_no_sandbox();
    }
    if let Some(ref path) = args.chromium_path {
        config.browser = config.browser.with_chromium_path(path.clone());
    }
    if let Some(strategy) = args.seed_strategy {
        config = config.with_seed_strategy(strategy.into());
    }
    if args.checkpoints {
        config = config.with_checkpoint_screenshots(true);
    }

    config
        .validate()
        .map_err(|e| CliError::config(e.to_string()))?;
    tracing::debug!(origin = %config.origin, artifact_dir = %config.artifact_dir.display(), "harness configured");
    Ok(config)
}

/// Resolve scenario names against the built-in catalog, keeping the
/// requested order. No names (or `--all`) selects everything.
pub fn select_scenarios(
    names: &[String],
    all: bool,
    config: &HarnessConfig,
) -> CliResult<Vec<Scenario>> {
    if all || names.is_empty() {
        return Ok(scenarios::all(config));
    }
    names
        .iter()
        .map(|name| {
            scenarios::builtin(name, config).ok_or_else(|| {
                let known: Vec<_> = scenarios::catalog().iter().map(|(n, _)| *n).collect();
                CliError::invalid_argument(format!(
                    "unknown scenario {name:?} (known: {})",
                    known.join(", ")
                ))
            })
        })
        .collect()
}

/// Runs selected scenarios against a real browser
#[derive(Debug)]
pub struct ScenarioCommand {
    cli: CliConfig,
    harness: HarnessConfig,
}

impl ScenarioCommand {
    /// Create a command for the given settings
    #[must_use]
    pub const fn new(cli: CliConfig, harness: HarnessConfig) -> Self {
        Self { cli, harness }
    }

    /// Run the scenarios selected by `args`; fails with
    /// [`CliError::ScenariosFailed`] when any scenario fails
    pub fn execute(&self, args: &RunArgs) -> CliResult<()> {
        let selected = select_scenarios(&args.scenarios, args.all, &self.harness)?;
        tracing::info!(
            count = selected.len(),
            strategy = ?self.harness.seed_strategy,
            "running scenarios"
        );
        let mut reporter = ProgressReporter::new(
            self.cli.color.should_color(),
            self.cli.verbosity.is_quiet(),
        )
        .with_verbose(self.cli.verbosity.is_verbose());

        reporter.header(&format!(
            "flowprobe: {} scenario(s) against {}",
            selected.len(),
            self.harness.origin
        ));
        let start = Instant::now();
        reporter.start_progress(selected.len() as u64, "scenarios");
        let summary = self.run_selected(&selected, &reporter)?;
        reporter.finish();
        reporter.summary(
            summary.passed_count(),
            summary.failed_count(),
            start.elapsed(),
        );

        if let Some(ref path) = args.json {
            tracing::debug!(path = %path.display(), "writing JSON summary");
            std::fs::write(path, summary.to_json()?)?;
            reporter.info(&format!("summary written to {}", path.display()));
        }

        if summary.all_passed() {
            Ok(())
        } else {
            Err(CliError::ScenariosFailed {
                failed: summary.failed_count(),
                total: summary.reports.len(),
            })
        }
    }

    #[cfg(feature = "browser")]
    fn run_selected(
        &self,
        selected: &[Scenario],
        reporter: &ProgressReporter,
    ) -> CliResult<RunSummary> {
        let runtime = tokio::runtime::Runtime::new()?;
        let runner = flowprobe::ScenarioRunner::new(self.harness.clone());
        let settings = &self.harness.browser;
        let summary = runtime.block_on(runner.run_all(
            selected,
            move || flowprobe::launch_page(settings),
            |report| {
                reporter.scenario(report);
                reporter.increment(1);
            },
        ));
        Ok(summary)
    }

    #[cfg(not(feature = "browser"))]
    fn run_selected(
        &self,
        _selected: &[Scenario],
        _reporter: &ProgressReporter,
    ) -> CliResult<RunSummary> {
        Err(CliError::Unsupported(
            "browser support not enabled. Rebuild with --features browser".to_string(),
        ))
    }
}

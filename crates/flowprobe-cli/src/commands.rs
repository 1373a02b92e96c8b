//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use flowprobe::SeedStrategy;
use std::path::PathBuf;

/// Flowprobe: end-to-end verification of the TaskFlow web client
#[derive(Parser, Debug)]
#[command(name = "flowprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Harness settings layered over the configuration file
    #[command(flatten)]
    pub harness: HarnessArgs,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run verification scenarios
    Run(RunArgs),

    /// List built-in scenarios
    List,

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Overrides for the harness configuration
#[derive(Args, Debug, Default, Clone)]
pub struct HarnessArgs {
    /// YAML configuration file
    #[arg(long, global = true, env = "FLOWPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Origin of the application under test
    #[arg(long, global = true, env = "FLOWPROBE_ORIGIN")]
    pub origin: Option<String>,

    /// Directory receiving diagnostic artifacts
    #[arg(long, global = true, env = "FLOWPROBE_ARTIFACT_DIR")]
    pub artifact_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headed: bool,

    /// Path to the chromium binary
    #[arg(long, global = true, env = "FLOWPROBE_CHROMIUM")]
    pub chromium_path: Option<PathBuf>,

    /// Disable the browser sandbox (containers, CI)
    #[arg(long, global = true)]
    pub no_sandbox: bool,

    /// How the session identity reaches storage
    #[arg(long, global = true)]
    pub seed_strategy: Option<SeedStrategyArg>,

    /// Capture screenshots at success checkpoints too
    #[arg(long, global = true)]
    pub checkpoints: bool,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenarios to run (all when omitted)
    pub scenarios: Vec<String>,

    /// Run every built-in scenario
    #[arg(long, conflicts_with = "scenarios")]
    pub all: bool,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub json: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Check the configuration without printing it
    #[arg(long)]
    pub check: bool,
}

/// Seeding strategy argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedStrategyArg {
    /// Register the seed before the page loads
    InitScript,
    /// Load, write storage, reload
    StorageReload,
}

impl From<SeedStrategyArg> for SeedStrategy {
    fn from(arg: SeedStrategyArg) -> Self {
        match arg {
            SeedStrategyArg::InitScript => Self::InitScript,
            SeedStrategyArg::StorageReload => Self::StorageThenReload,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

//! Flowprobe CLI Library
//!
//! Command-line interface for running the TaskFlow verification scenarios.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, HarnessArgs, RunArgs, SeedStrategyArg,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
pub use runner::{build_harness_config, select_scenarios, ScenarioCommand};

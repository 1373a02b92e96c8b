//! Flowprobe CLI: end-to-end verification of the TaskFlow web client
//!
//! ## Usage
//!
//! ```bash
//! flowprobe list                                   # Built-in scenarios
//! flowprobe run                                    # Run everything
//! flowprobe run smart_add --origin http://ci:3000  # One scenario elsewhere
//! flowprobe run --all --json target/summary.json   # Machine-readable result
//! flowprobe config                                 # Effective settings
//! ```
//!
//! Exit status: 0 when every scenario passed, 1 when any failed, 2 when the
//! run could not start.

use clap::Parser;
use flowprobe_cli::{
    build_harness_config, Cli, CliConfig, CliResult, ColorChoice, Commands, ConfigArgs,
    ScenarioCommand, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    config.init_logging();

    match cli.command {
        Commands::Run(ref args) => {
            let harness = build_harness_config(&cli.harness)?;
            ScenarioCommand::new(config, harness).execute(args)
        }
        Commands::List => {
            run_list();
            Ok(())
        }
        Commands::Config(ref args) => run_config(&cli, args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

fn run_list() {
    let width = flowprobe::scenarios::catalog()
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    for (name, description) in flowprobe::scenarios::catalog() {
        println!("{name:<width$}  {description}");
    }
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> CliResult<()> {
    let harness = build_harness_config(&cli.harness)?;
    if args.check {
        println!("configuration OK (origin {})", harness.origin);
        return Ok(());
    }
    print!("{}", harness.to_yaml()?);
    Ok(())
}

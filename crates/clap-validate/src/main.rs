//! A validator and automatic test suite for CLAP plug-ins.
//!
//! Loads one or more `.clap` libraries, instantiates every plug-in they
//! expose against a validating host, and runs a battery of conformance tests
//! covering descriptors, feature metadata, audio and note processing,
//! parameter semantics, and state serialization.

mod commands;
mod report;
mod search;
mod util;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::list::ListCommand;
use commands::validate::ValidateSettings;

#[derive(Parser, Debug)]
#[command(
    name = "clap-validate",
    version,
    about = "Validates CLAP plug-ins for ABI conformance"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one or more CLAP plug-ins
    Validate(ValidateSettings),
    /// List installed plug-ins, available tests, or presets
    #[command(subcommand)]
    List(ListCommand),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Argument errors exit with status 1 rather than clap's default of 2;
    // --help and --version still exit with 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let result = match cli.command {
        Command::Validate(settings) => commands::validate::run(&settings),
        Command::List(command) => commands::list::run(&command),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

//! # sts
//!
//! Command-line front end of the security token service.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use sts_cli::cli::{Cli, Command};
use sts_cli::commands::{run_duration, run_encode, run_issue, run_validate};
use sts_cli::output::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Command::Issue(args) => run_issue(args, cli.config.as_deref(), cli.output),
        Command::Validate(args) => run_validate(args, cli.output),
        Command::Duration { value } => run_duration(value, cli.output),
        Command::Encode(args) => run_encode(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

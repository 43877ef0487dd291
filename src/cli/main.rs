//! staged-ingest - load data files through a validated staging table
//!
//! Exit code 0 when every requested entity was committed (or read, in a dry
//! run), 1 on any setup or pipeline failure.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use staged_ingest::cli::{Cli, commands};
use staged_ingest::pipeline::ConfigError;

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match commands::handle_ingest(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            match e.downcast_ref::<ConfigError>() {
                Some(config_error) => eprintln!("Error: {}", config_error.user_message()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

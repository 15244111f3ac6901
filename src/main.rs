//! corredor CLI
//!
//! Runs a synthetic epoch/batch loop described by a YAML file, with the
//! configured reducers, early stopping, checkpointing and progress display.
//!
//! # Usage
//!
//! ```bash
//! # Run from config
//! corredor run run.yaml
//!
//! # Run with overrides
//! corredor run run.yaml --epochs 20 --no-progress
//!
//! # Validate config
//! corredor validate run.yaml --detailed
//! ```

use clap::Parser;
use corredor::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

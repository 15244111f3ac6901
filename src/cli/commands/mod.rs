//! CLI command implementations

mod run;
mod validate;

pub use run::{execute_spec, RunSummary};

use crate::cli::logging::{self, LogLevel};
use crate::config::{Cli, Command};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let log_level = LogLevel::from_flags(cli.verbose, cli.quiet);
    logging::init(log_level);

    match cli.command {
        Command::Run(args) => run::run_run(args, log_level),
        Command::Validate(args) => validate::run_validate(args, log_level),
    }
}

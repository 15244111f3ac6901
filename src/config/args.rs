//! CLI argument types

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// corredor: event-driven epoch/batch runner
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "corredor")]
#[command(version)]
#[command(about = "Event-driven epoch/batch runner with reducers, early stopping and checkpointing")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the loop described by a YAML configuration
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override checkpoint directory
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("args should parse")
    }

    #[test]
    fn test_parse_run_command() {
        let cli = parse_args(&["corredor", "run", "run.yaml"]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.config, PathBuf::from("run.yaml"));
                assert_eq!(args.epochs, None);
                assert!(!args.no_progress);
            }
            Command::Validate(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = parse_args(&[
            "corredor",
            "run",
            "run.yaml",
            "--epochs",
            "7",
            "--checkpoint-dir",
            "/tmp/ckpt",
            "--no-progress",
        ]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.epochs, Some(7));
                assert_eq!(args.checkpoint_dir, Some(PathBuf::from("/tmp/ckpt")));
                assert!(args.no_progress);
            }
            Command::Validate(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_validate_detailed() {
        let cli = parse_args(&["corredor", "validate", "run.yaml", "--detailed"]);
        assert_eq!(
            cli.command,
            Command::Validate(ValidateArgs { config: PathBuf::from("run.yaml"), detailed: true })
        );
    }

    #[test]
    fn test_global_flags() {
        let cli = parse_args(&["corredor", "validate", "run.yaml", "--verbose"]);
        assert!(cli.verbose);
        assert!(!cli.quiet);

        let cli = parse_args(&["corredor", "-q", "run", "run.yaml"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_missing_config_rejected() {
        assert!(Cli::try_parse_from(["corredor", "run"]).is_err());
    }
}

//! CLI module for corredor
//!
//! This module contains the command handlers and logging setup.

mod commands;
mod logging;

pub use commands::{execute_spec, run_command, RunSummary};
pub use logging::LogLevel;

// Re-export Cli from config for convenience
pub use crate::config::Cli;

//! Declarative run configuration
//!
//! - `schema`: YAML structure of a run
//! - `loader`: reading and parsing
//! - `validate`: value checks with their own error type
//! - `args`: command line arguments

mod args;
mod loader;
mod schema;
mod validate;

pub use args::{Cli, Command, RunArgs, ValidateArgs};
pub use loader::{load_and_validate, load_config, ConfigError};
pub use schema::{CheckpointSpec, EarlyStoppingSpec, ReducerSpec, RunSpec};
pub use validate::{validate_config, ValidationError};

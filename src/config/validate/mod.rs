//! Configuration validation
//!
//! Validates run specifications before anything is executed.

mod error;
mod validator;

#[cfg(test)]
mod proptests;

pub use error::ValidationError;
pub use validator::validate_config;

//! Error types for runners, state access and attachments

use std::path::Path;
use thiserror::Error;

/// Result type alias for corredor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the runner machinery itself.
///
/// Errors returned by user handlers are never wrapped in this type; they
/// travel through [`Runner::run`](crate::Runner::run) as the original
/// `anyhow::Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// Attachment already registered its handlers on a runner.
    #[error("Attachment is already attached to a runner\n  → Detach it first or create a new one")]
    AlreadyAttached,

    /// Detach was requested on a runner that does not own the handlers.
    #[error("Attachment is attached to a different runner")]
    ForeignRunner,

    /// A hook handle outlived the runner it belongs to.
    #[error("Runner was dropped\n  → Register handlers while the runner is alive")]
    RunnerDropped,

    /// A state key was read before any handler wrote it.
    #[error("State key not found: '{0}'")]
    MissingKey(String),

    /// A state key holds a value of the wrong shape.
    #[error("State key '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// IO error for a path-bound operation.
    pub(crate) fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{action} {}", path.display()), source)
    }

    pub(crate) fn type_mismatch(
        key: &str,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        Self::TypeMismatch { key: key.to_string(), expected, found: describe(found) }
    }
}

fn describe(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(a) => format!("array of {} items", a.len()),
        Value::Object(_) => "object".to_string(),
    }
}

//! Validation error types

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Batch list cannot be empty")]
    EmptyBatches,

    #[error("Invalid batch value: {0} (must be finite)")]
    InvalidBatchValue(f64),

    #[error("Invalid decay: {0} (must be finite and > 0.0)")]
    InvalidDecay(f64),

    #[error("Invalid floor: {0} (must be finite)")]
    InvalidFloor(f64),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(u64),

    #[error("Invalid reducer kind: {0} (must be one of: mean, sum)")]
    InvalidReducerKind(String),

    #[error("Reducer name cannot be empty")]
    EmptyReducerName,

    #[error("Duplicate reducer name: {0}")]
    DuplicateReducerName(String),

    #[error("Invalid patience: {0} (must be > 0)")]
    InvalidPatience(usize),

    #[error("Invalid eps: {0} (must be finite and >= 0.0)")]
    InvalidEps(f64),

    #[error("Invalid max_saved: {0} (must be > 0)")]
    InvalidMaxSaved(usize),

    #[error("Monitored key {0} is not produced by any reducer")]
    UnknownMonitor(String),
}

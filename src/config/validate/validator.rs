//! Configuration validation logic

use std::collections::HashSet;

use super::error::ValidationError;
use crate::config::schema::RunSpec;

const REDUCER_KINDS: [&str; 2] = ["mean", "sum"];

/// Validate a run specification
///
/// Checks:
/// - Numeric values are in valid ranges
/// - Reducer kinds match allowed values and names are unique
/// - Monitored keys are written by a reducer (or are the raw `output`)
pub fn validate_config(spec: &RunSpec) -> Result<(), ValidationError> {
    if spec.max_epoch == 0 {
        return Err(ValidationError::InvalidEpochs(spec.max_epoch));
    }

    if spec.batches.is_empty() {
        return Err(ValidationError::EmptyBatches);
    }
    if let Some(bad) = spec.batches.iter().find(|b| !b.is_finite()) {
        return Err(ValidationError::InvalidBatchValue(*bad));
    }

    if !spec.decay.is_finite() || spec.decay <= 0.0 {
        return Err(ValidationError::InvalidDecay(spec.decay));
    }
    if !spec.floor.is_finite() {
        return Err(ValidationError::InvalidFloor(spec.floor));
    }

    if spec.batch_size == Some(0) {
        return Err(ValidationError::InvalidBatchSize(0));
    }

    let mut names = HashSet::new();
    for reducer in &spec.reducers {
        if reducer.name.is_empty() {
            return Err(ValidationError::EmptyReducerName);
        }
        if !REDUCER_KINDS.contains(&reducer.kind.as_str()) {
            return Err(ValidationError::InvalidReducerKind(reducer.kind.clone()));
        }
        if !names.insert(reducer.name.as_str()) {
            return Err(ValidationError::DuplicateReducerName(reducer.name.clone()));
        }
    }
    let is_known = |key: &str| key == "output" || names.contains(key);

    if let Some(es) = &spec.early_stopping {
        if es.patience == 0 {
            return Err(ValidationError::InvalidPatience(es.patience));
        }
        if !es.eps.is_finite() || es.eps < 0.0 {
            return Err(ValidationError::InvalidEps(es.eps));
        }
        if !is_known(&es.monitor) {
            return Err(ValidationError::UnknownMonitor(es.monitor.clone()));
        }
    }

    if let Some(ckpt) = &spec.checkpoint {
        if ckpt.max_saved == 0 {
            return Err(ValidationError::InvalidMaxSaved(ckpt.max_saved));
        }
        if let Some(monitor) = &ckpt.monitor {
            if !is_known(monitor) {
                return Err(ValidationError::UnknownMonitor(monitor.clone()));
            }
        }
    }

    Ok(())
}

//! YAML schema for declarative runs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::attachments::Mode;

/// Complete run specification
///
/// Each batch is a number; the synthetic batch handler writes
/// `max(batch * decay^(epoch - 1), floor)` to `state["output"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Maximum number of epochs
    pub max_epoch: usize,

    /// Batch values, replayed every epoch
    pub batches: Vec<f64>,

    /// Per-epoch multiplier applied to batch values
    #[serde(default = "default_decay")]
    pub decay: f64,

    /// Lower bound on batch outputs
    #[serde(default)]
    pub floor: f64,

    /// Items per batch, reported as `state["size"]` and `state["n_items"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u64>,

    /// Per-epoch reductions of batch values
    #[serde(default = "default_reducers")]
    pub reducers: Vec<ReducerSpec>,

    /// Optional early stopping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stopping: Option<EarlyStoppingSpec>,

    /// Optional checkpointing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointSpec>,

    /// Show a progress bar per epoch
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Log the duration of every epoch
    #[serde(default = "default_true")]
    pub log_epoch_time: bool,
}

/// A reduction published as `state[name]` at the end of every epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerSpec {
    /// State key the result is written to
    pub name: String,

    /// `mean` or `sum`
    #[serde(default = "default_reducer_kind")]
    pub kind: String,

    /// State key holding batch values
    #[serde(default = "default_value_key")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingSpec {
    #[serde(default = "default_patience")]
    pub patience: usize,

    /// State key to monitor
    #[serde(default = "default_monitor")]
    pub monitor: String,

    #[serde(default)]
    pub mode: Mode,

    /// Minimum change counting as improvement
    #[serde(default = "default_eps")]
    pub eps: f64,
}

impl Default for EarlyStoppingSpec {
    fn default() -> Self {
        Self {
            patience: default_patience(),
            monitor: default_monitor(),
            mode: Mode::Min,
            eps: default_eps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSpec {
    /// Directory checkpoints are written to
    pub dir: PathBuf,

    /// Number of checkpoints kept on disk
    #[serde(default = "default_max_saved")]
    pub max_saved: usize,

    /// Only save when this state key improves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<String>,

    #[serde(default)]
    pub mode: Mode,
}

fn default_decay() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_reducers() -> Vec<ReducerSpec> {
    vec![ReducerSpec {
        name: "loss".to_string(),
        kind: default_reducer_kind(),
        value: default_value_key(),
    }]
}

fn default_reducer_kind() -> String {
    "mean".to_string()
}

fn default_value_key() -> String {
    "output".to_string()
}

fn default_patience() -> usize {
    5
}

fn default_monitor() -> String {
    "loss".to_string()
}

fn default_eps() -> f64 {
    1e-4
}

fn default_max_saved() -> usize {
    1
}

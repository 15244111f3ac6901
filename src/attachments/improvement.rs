//! Improvement tracking shared by early stopping and checkpointing

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::state::State;

/// Direction in which a monitored value improves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Lower is better (losses)
    #[default]
    Min,
    /// Higher is better (accuracies)
    Max,
}

/// Tracks the best value seen so far
///
/// Values are vectors so that tuples such as `(accuracy, -loss)` can be
/// monitored; they are compared element by element and the first element
/// that is clearly better or worse decides. A single mode applies to every
/// element unless one mode per element is given.
#[derive(Clone, Debug)]
pub struct Improvement {
    modes: Vec<Mode>,
    eps: f64,
    best: Option<Vec<f64>>,
}

impl Improvement {
    pub fn new(mode: Mode, eps: f64) -> Self {
        Self::with_modes(vec![mode], eps)
    }

    /// One mode per element of the monitored value
    pub fn with_modes(modes: Vec<Mode>, eps: f64) -> Self {
        let modes = if modes.is_empty() { vec![Mode::Min] } else { modes };
        Self { modes, eps, best: None }
    }

    /// Best value seen so far
    pub fn best(&self) -> Option<&[f64]> {
        self.best.as_deref()
    }

    /// Forget the best value
    pub fn reset(&mut self) {
        self.best = None;
    }

    /// Record `value` and report whether it improved on the best so far
    ///
    /// The first observed value always counts as an improvement.
    pub fn observe(&mut self, value: &[f64]) -> bool {
        let improved = match &self.best {
            None => true,
            Some(best) => self.improves_on(value, best),
        };
        if improved {
            self.best = Some(value.to_vec());
        }
        improved
    }

    fn improves_on(&self, value: &[f64], best: &[f64]) -> bool {
        for (i, (v, b)) in value.iter().zip(best).enumerate() {
            let mode = self.mode_at(i);
            if self.better(*v, *b, mode) {
                return true;
            }
            if self.better(*b, *v, mode) {
                return false;
            }
        }
        false
    }

    fn mode_at(&self, i: usize) -> Mode {
        self.modes.get(i).or(self.modes.last()).copied().unwrap_or_default()
    }

    fn better(&self, x: f64, y: f64, mode: Mode) -> bool {
        match mode {
            Mode::Min => x <= y - self.eps,
            Mode::Max => x >= y + self.eps,
        }
    }
}

/// Read a monitored value: a number or an array of numbers
pub(crate) fn read_monitored<B>(state: &State<B>, key: &str) -> Result<Vec<f64>> {
    let value = state.require(key)?;
    let mismatch = || Error::type_mismatch(key, "number or array of numbers", value);
    match value {
        Value::Number(n) => n.as_f64().map(|x| vec![x]).ok_or_else(mismatch),
        Value::Array(items) if !items.is_empty() => {
            items.iter().map(|item| item.as_f64().ok_or_else(mismatch)).collect()
        }
        _ => Err(mismatch()),
    }
}

/// Format a monitored value for logging
pub(crate) fn display_value(value: &[f64]) -> String {
    match value {
        [single] => format!("{single:.6}"),
        many => {
            let parts: Vec<String> = many.iter().map(|v| format!("{v:.6}")).collect();
            format!("({})", parts.join(", "))
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// In min mode the best value never increases
        #[test]
        fn best_is_monotone_in_min_mode(values in prop::collection::vec(-100.0f64..100.0, 1..30)) {
            let mut imp = Improvement::new(Mode::Min, 1e-4);
            let mut last_best = f64::INFINITY;
            for v in values {
                imp.observe(&[v]);
                let best = imp.best().unwrap()[0];
                prop_assert!(best <= last_best);
                last_best = best;
            }
        }
    }
}

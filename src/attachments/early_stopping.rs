//! Early stopping attachment to halt a run when a monitored value plateaus

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use super::improvement::{display_value, read_monitored, Improvement, Mode};
use super::traits::{Attachment, Binding};
use crate::event::Event;
use crate::runner::{HandlerId, Runner};

/// Early stopping attachment
///
/// At the end of every epoch reads `state[value_key]` and stops the run once
/// `patience` consecutive epochs passed without improvement. Register the
/// handler that writes the monitored value (e.g. a validation pass) on
/// `EpochFinished` before attaching this.
///
/// # Example
///
/// ```rust
/// use corredor::attachments::{Attachment, EarlyStopper};
/// use corredor::{Event, Runner};
///
/// let losses = [0.9, 0.5, 0.6, 0.7, 0.8, 0.9];
/// let mut runner: Runner<u8> = Runner::new();
/// runner.on(Event::EpochFinished, move |state| {
///     let epoch = state.epoch().unwrap_or(1);
///     state.set("loss", losses[epoch - 1]);
///     Ok(())
/// });
/// EarlyStopper::new(2).attach_on(&mut runner).unwrap();
///
/// let state = runner.run(vec![0], 6).unwrap();
/// assert_eq!(state.n_iters(), 4);
/// ```
#[derive(Debug)]
pub struct EarlyStopper {
    patience: usize,
    value_key: String,
    modes: Vec<Mode>,
    eps: f64,
    tracker: Rc<RefCell<PatienceTracker>>,
    binding: Binding,
}

#[derive(Debug)]
struct PatienceTracker {
    improvement: Improvement,
    patience: usize,
    epochs_without_improvement: usize,
}

impl PatienceTracker {
    /// Returns true when patience is exhausted
    ///
    /// An improving epoch never exhausts patience; with a patience of 0 the
    /// first epoch without improvement does.
    fn observe(&mut self, value: &[f64]) -> bool {
        if self.improvement.observe(value) {
            self.epochs_without_improvement = 0;
            return false;
        }
        self.epochs_without_improvement += 1;
        self.epochs_without_improvement >= self.patience
    }

    fn reset(&mut self) {
        self.improvement.reset();
        self.epochs_without_improvement = 0;
    }
}

impl EarlyStopper {
    /// Stop after `patience` epochs without improvement of `state["loss"]`
    ///
    /// A patience of 0 behaves like 1: stop at the first epoch that does
    /// not improve.
    pub fn new(patience: usize) -> Self {
        let mut stopper = Self {
            patience,
            value_key: "loss".to_string(),
            modes: vec![Mode::Min],
            eps: 1e-4,
            tracker: Rc::new(RefCell::new(PatienceTracker {
                improvement: Improvement::new(Mode::Min, 1e-4),
                patience,
                epochs_without_improvement: 0,
            })),
            binding: Binding::default(),
        };
        stopper.rebuild();
        stopper
    }

    /// Monitor `state[key]` instead of `state["loss"]`
    pub fn monitor(mut self, key: impl Into<String>) -> Self {
        self.value_key = key.into();
        self
    }

    /// Direction of improvement
    pub fn mode(mut self, mode: Mode) -> Self {
        self.modes = vec![mode];
        self.rebuild();
        self
    }

    /// One direction per element when the monitored value is an array
    pub fn modes(mut self, modes: Vec<Mode>) -> Self {
        self.modes = modes;
        self.rebuild();
        self
    }

    /// Minimum change that counts as improvement
    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self.rebuild();
        self
    }

    /// Best monitored value seen in the current run
    pub fn best(&self) -> Option<Vec<f64>> {
        self.tracker.borrow().improvement.best().map(<[f64]>::to_vec)
    }

    /// Consecutive epochs without improvement so far
    pub fn epochs_without_improvement(&self) -> usize {
        self.tracker.borrow().epochs_without_improvement
    }

    fn rebuild(&mut self) {
        let mut tracker = self.tracker.borrow_mut();
        tracker.improvement = Improvement::with_modes(self.modes.clone(), self.eps);
        tracker.patience = self.patience;
        tracker.epochs_without_improvement = 0;
    }
}

impl Default for EarlyStopper {
    fn default() -> Self {
        Self::new(5)
    }
}

impl<B: 'static> Attachment<B> for EarlyStopper {
    fn register(&mut self, runner: &mut Runner<B>) -> Vec<HandlerId> {
        let tracker = Rc::clone(&self.tracker);
        let reset = runner.on(Event::Started, move |_| {
            tracker.borrow_mut().reset();
            Ok(())
        });

        let tracker = Rc::clone(&self.tracker);
        let key = self.value_key.clone();
        let check = runner.on(Event::EpochFinished, move |state| {
            let value = read_monitored(state, &key)?;
            let mut tracker = tracker.borrow_mut();
            if tracker.observe(&value) {
                let best = tracker.improvement.best().map(display_value).unwrap_or_default();
                info!(
                    patience = tracker.patience,
                    "Patience exceeded, stopping early (best {key}: {best})"
                );
                state.stop();
            }
            Ok(())
        });

        vec![reset, check]
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn run_with_losses(stopper: &mut EarlyStopper, losses: &'static [f64]) -> usize {
        let mut runner: Runner<()> = Runner::new();
        runner.on(Event::EpochFinished, move |state| {
            let epoch = state.epoch().unwrap_or(1);
            state.set("loss", losses[epoch - 1]);
            Ok(())
        });
        stopper.attach_on(&mut runner).unwrap();
        let state = runner.run(vec![()], losses.len()).unwrap();
        state.n_iters()
    }

    #[test]
    fn test_early_stopping_patience() {
        // best at epoch 3, stop after 3 more epochs without improvement
        let losses = &[5.0, 4.0, 3.0, 4.0, 5.0, 4.0, 3.5, 2.0, 1.0];
        let mut es = EarlyStopper::new(3);
        assert_eq!(run_with_losses(&mut es, losses), 6);
        assert_eq!(es.best(), Some(vec![3.0]));
        assert_eq!(es.epochs_without_improvement(), 3);
    }

    #[test]
    fn test_early_stopping_improvement_resets() {
        let losses = &[1.0, 1.0, 0.5, 0.6, 0.4, 0.45];
        let mut es = EarlyStopper::new(2);
        assert_eq!(run_with_losses(&mut es, losses), 6);
        assert_eq!(es.epochs_without_improvement(), 1);
    }

    #[test]
    fn test_early_stopping_within_eps_is_not_improvement() {
        let losses = &[1.0, 0.9995, 0.999, 0.5];
        let mut es = EarlyStopper::new(2).eps(0.01);
        assert_eq!(run_with_losses(&mut es, losses), 3);
    }

    #[test]
    fn test_early_stopping_max_mode() {
        let accuracies = &[0.5, 0.6, 0.55, 0.58, 0.9];
        let mut es = EarlyStopper::new(2).mode(Mode::Max);
        assert_eq!(run_with_losses(&mut es, accuracies), 4);
        assert_eq!(es.best(), Some(vec![0.6]));
    }

    #[test]
    fn test_zero_patience_keeps_running_while_improving() {
        let losses = &[5.0, 4.0, 3.0, 2.0, 1.0];
        let mut es = EarlyStopper::new(0);
        assert_eq!(run_with_losses(&mut es, losses), 5);
        assert_eq!(es.epochs_without_improvement(), 0);
    }

    #[test]
    fn test_zero_patience_stops_on_first_plateau() {
        let losses = &[5.0, 4.0, 4.0, 3.0];
        let mut es = EarlyStopper::new(0);
        assert_eq!(run_with_losses(&mut es, losses), 3);
    }

    #[test]
    fn test_early_stopping_custom_key() {
        let mut runner: Runner<()> = Runner::new();
        runner.on(Event::EpochFinished, |state| {
            state.set("val_acc", 0.5);
            Ok(())
        });
        EarlyStopper::new(1).monitor("val_acc").attach_on(&mut runner).unwrap();

        let state = runner.run(vec![()], 10).unwrap();
        assert_eq!(state.n_iters(), 2);
    }

    #[test]
    fn test_early_stopping_missing_key_errors() {
        let mut runner: Runner<()> = Runner::new();
        EarlyStopper::default().attach_on(&mut runner).unwrap();

        let err = runner.run(vec![()], 2).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingKey(k)) if k == "loss"));
    }

    #[test]
    fn test_early_stopping_resets_between_runs() {
        let losses = &[1.0, 2.0, 3.0];
        let mut es = EarlyStopper::new(2);
        let mut runner: Runner<()> = Runner::new();
        runner.on(Event::EpochFinished, move |state| {
            let epoch = state.epoch().unwrap_or(1);
            state.set("loss", losses[epoch - 1]);
            Ok(())
        });
        es.attach_on(&mut runner).unwrap();

        assert_eq!(runner.run(vec![()], 3).unwrap().n_iters(), 3);
        assert_eq!(runner.run(vec![()], 3).unwrap().n_iters(), 3);
        assert_eq!(es.best(), Some(vec![1.0]));
    }

    #[test]
    fn test_detached_stopper_no_longer_stops() {
        let losses = &[1.0, 2.0, 3.0, 4.0];
        let mut es = EarlyStopper::new(1);
        let mut runner: Runner<()> = Runner::new();
        runner.on(Event::EpochFinished, move |state| {
            let epoch = state.epoch().unwrap_or(1);
            state.set("loss", losses[epoch - 1]);
            Ok(())
        });
        es.attach_on(&mut runner).unwrap();
        es.detach_from(&mut runner).unwrap();

        assert_eq!(runner.run(vec![()], 4).unwrap().n_iters(), 4);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The run halts `max(patience, 1)` epochs after the last improvement
        #[test]
        fn stops_within_patience_of_last_improvement(
            patience in 0usize..6,
            improving in 1usize..6,
            max_epoch in 1usize..20,
        ) {
            let mut runner: Runner<()> = Runner::new();
            runner.on(Event::EpochFinished, move |state| {
                let epoch = state.epoch().unwrap_or(1);
                // strictly decreasing for `improving` epochs, flat afterwards
                let loss = 10.0 - epoch.min(improving) as f64;
                state.set("loss", loss);
                Ok(())
            });
            EarlyStopper::new(patience).attach_on(&mut runner).unwrap();

            let state = runner.run(vec![()], max_epoch).unwrap();

            // a patience of 0 still lets the first flat epoch happen
            let expected = max_epoch.min(improving + patience.max(1));
            prop_assert_eq!(state.n_iters(), expected);
        }
    }
}

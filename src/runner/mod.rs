//! Epoch/batch runner with event dispatch
//!
//! A [`Runner`] iterates over batches for a number of epochs and emits
//! [`Event`]s along the way:
//!
//! ```text
//! Started
//! EpochStarted            ┐
//!   BatchStarted ┐        │ once per epoch
//!   Batch        │ per    │
//!   BatchFinished┘ batch  │
//! EpochFinished           ┘
//! Finished
//! ```
//!
//! Handlers do all the work. A handler that returns an error aborts the run
//! and the error comes back out of [`Runner::run`] untouched.
//!
//! # Example
//!
//! ```rust
//! use corredor::{Event, Runner};
//!
//! let mut runner: Runner<f64> = Runner::new();
//! runner.on(Event::Batch, |state| {
//!     let loss = state.batch().copied().unwrap_or_default();
//!     state.set("output", loss);
//!     Ok(())
//! });
//! runner.on(Event::EpochFinished, |state| {
//!     if state.epoch() == Some(2) {
//!         state.stop();
//!     }
//!     Ok(())
//! });
//!
//! let state = runner.run(vec![0.3, 0.2, 0.1], 10).unwrap();
//! assert_eq!(state.n_iters(), 6);
//! ```

mod hooks;


pub use hooks::{Handler, HandlerId, Hooks};

use std::rc::{Rc, Weak};

use tracing::debug;

use crate::event::{Event, Stage};
use crate::state::State;
use hooks::HandlerTable;

/// Event-driven loop over epochs and batches
pub struct Runner<B> {
    handlers: HandlerTable<B>,
    alive: Rc<()>,
}

impl<B> Runner<B> {
    /// Create a runner with no handlers
    pub fn new() -> Self {
        Self { handlers: HandlerTable::new(), alive: Rc::new(()) }
    }

    /// Unique id of this runner
    pub fn id(&self) -> u64 {
        self.handlers.runner_id()
    }

    /// Register a handler for an event
    ///
    /// Handlers of the same event are called in the order they were
    /// registered.
    pub fn on<F>(&mut self, event: Event, handler: F) -> HandlerId
    where
        F: FnMut(&mut State<B>) -> anyhow::Result<()> + 'static,
    {
        self.handlers.on_stage(event, Stage::Main, handler)
    }

    /// Register a handler in a specific stage of an event
    pub fn on_stage<F>(&mut self, event: Event, stage: Stage, handler: F) -> HandlerId
    where
        F: FnMut(&mut State<B>) -> anyhow::Result<()> + 'static,
    {
        self.handlers.on_stage(event, stage, handler)
    }

    /// Remove a registered handler. Returns `false` if it was not registered here.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        self.handlers.remove(id)
    }

    /// Number of handlers registered for an event across all stages
    pub fn handler_count(&self, event: Event) -> usize {
        Stage::ALL.iter().map(|stage| self.handlers.handler_count(event, *stage)).sum()
    }

    /// Token that expires when this runner is dropped
    pub(crate) fn liveness(&self) -> Weak<()> {
        Rc::downgrade(&self.alive)
    }

    /// Handle for registering handlers from inside a running handler
    ///
    /// The handle does not keep the runner alive.
    pub fn hooks(&self) -> Hooks<B> {
        self.handlers.hooks()
    }

    /// Run over `batches` for at most `max_epoch` epochs
    ///
    /// `batches` is cloned and re-iterated at the start of every epoch. The
    /// run ends early when a handler calls [`State::stop`]; the flag is
    /// checked before every batch and every epoch.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a handler. No further events are
    /// emitted after it.
    pub fn run<I>(&mut self, batches: I, max_epoch: usize) -> anyhow::Result<State<B>>
    where
        I: IntoIterator<Item = B> + Clone,
    {
        let mut state = State::new(max_epoch);
        debug!(runner = self.id(), max_epoch, "run started");

        self.handlers.emit(Event::Started, &mut state)?;

        for epoch in 1..=max_epoch {
            if !state.running {
                break;
            }

            let epoch_batches = batches.clone().into_iter();
            state.epoch = Some(epoch);
            state.epoch_len = exact_len(&epoch_batches);
            self.handlers.emit(Event::EpochStarted, &mut state)?;

            for (index, batch) in epoch_batches.enumerate() {
                if !state.running {
                    break;
                }
                state.n_iters += 1;
                state.batch = Some(batch);
                state.batch_index = Some(index);
                self.handlers.emit(Event::BatchStarted, &mut state)?;
                self.handlers.emit(Event::Batch, &mut state)?;
                self.handlers.emit(Event::BatchFinished, &mut state)?;
            }

            state.batch = None;
            state.batch_index = None;
            self.handlers.emit(Event::EpochFinished, &mut state)?;
        }

        state.epoch = None;
        self.handlers.emit(Event::Finished, &mut state)?;
        debug!(runner = self.id(), n_iters = state.n_iters, stopped = !state.running, "run finished");
        Ok(state)
    }
}

impl<B> Default for Runner<B> {
    fn default() -> Self {
        Self::new()
    }
}

fn exact_len<I: Iterator>(iter: &I) -> Option<usize> {
    match iter.size_hint() {
        (lower, Some(upper)) if lower == upper => Some(lower),
        _ => None,
    }
}

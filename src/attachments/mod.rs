//! Attachments: groups of handlers attached to a runner as a unit
//!
//! Built-in attachments:
//! - [`Reduction`] with [`MeanReducer`], [`SumReducer`] or [`LambdaReducer`]
//! - [`EarlyStopper`]
//! - [`Checkpointer`]
//! - [`ProgressBar`]
//! - [`EpochTimer`]
//!
//! # Example
//!
//! ```rust
//! use corredor::attachments::{Attachment, EarlyStopper, Reduction};
//! use corredor::{Event, Runner};
//!
//! let mut runner: Runner<f64> = Runner::new();
//! runner.on(Event::Batch, |state| {
//!     let epoch = state.epoch().unwrap_or(1) as f64;
//!     let batch = state.batch().copied().unwrap_or_default();
//!     state.set("output", batch / epoch.min(3.0));
//!     Ok(())
//! });
//! Reduction::mean("loss").attach_on(&mut runner).unwrap();
//! EarlyStopper::new(2).attach_on(&mut runner).unwrap();
//!
//! // loss stops improving after epoch 3
//! let state = runner.run(vec![1.0, 2.0], 10).unwrap();
//! assert_eq!(state.n_iters(), 10);
//! ```

mod checkpoint;
mod early_stopping;
mod epoch_timer;
mod improvement;
mod progress;
mod reducer;
mod traits;

pub use checkpoint::{save_json, Checkpointer, SaveFn};
pub use early_stopping::EarlyStopper;
pub use epoch_timer::{format_duration, EpochTimer, Timer, WallClock};
pub use improvement::{Improvement, Mode};
pub use progress::ProgressBar;
pub use reducer::{LambdaReducer, MeanReducer, Reducer, Reduction, SumReducer};
pub use traits::{Attachment, Binding};

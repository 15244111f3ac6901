//! corredor: event-driven epoch/batch runner
//!
//! A [`Runner`] iterates over batches for a number of epochs and dispatches
//! lifecycle [`Event`]s to registered handlers, which share a mutable
//! [`State`]. [`attachments`] bundle handlers into reusable units: running
//! reductions, early stopping, checkpointing, progress display and epoch
//! timing.
//!
//! # Example
//!
//! ```rust
//! use corredor::attachments::{Attachment, Reduction};
//! use corredor::{Event, Runner};
//!
//! let mut runner: Runner<f64> = Runner::new();
//! runner.on(Event::Batch, |state| {
//!     let x = state.batch().copied().unwrap_or_default();
//!     state.set("output", x * x);
//!     Ok(())
//! });
//! Reduction::mean("mean_square").attach_on(&mut runner)?;
//!
//! let state = runner.run(vec![1.0, 2.0, 3.0], 2)?;
//! assert_eq!(state.n_iters(), 6);
//! assert!((state.get_f64("mean_square")? - 14.0 / 3.0).abs() < 1e-12);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod attachments;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod runner;
pub mod state;

pub use error::{Error, Result};
pub use event::{Event, Stage};
pub use runner::{HandlerId, Hooks, Runner};
pub use state::State;

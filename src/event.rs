//! Lifecycle events emitted by a [`Runner`](crate::Runner)

use std::fmt;

/// Lifecycle points of a run, in emission order
///
/// A run emits `Started`, then for every epoch `EpochStarted`, the three
/// batch events for every batch, and `EpochFinished`, and finally `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    /// Emitted once at the start of a run
    Started,
    /// Emitted at the start of each epoch
    EpochStarted,
    /// Emitted before a batch is processed
    BatchStarted,
    /// Emitted to process a batch; handlers here do the actual work
    Batch,
    /// Emitted after a batch is processed
    BatchFinished,
    /// Emitted at the end of each epoch, including an epoch cut short by a stop
    EpochFinished,
    /// Emitted once when a run ends without error
    Finished,
}

impl Event {
    /// All events in emission order.
    pub const ALL: [Event; 7] = [
        Event::Started,
        Event::EpochStarted,
        Event::BatchStarted,
        Event::Batch,
        Event::BatchFinished,
        Event::EpochFinished,
        Event::Finished,
    ];
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Ordering slot within a single event emission
///
/// Handlers registered with [`Runner::on`](crate::Runner::on) run in `Main`.
/// Attachments use `Before` and `After` to prepare or consume values around
/// user handlers, e.g. a reducer folds `state["output"]` in `Batch/After`
/// once the user's `Batch` handlers have written it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Stage {
    Before,
    #[default]
    Main,
    After,
}

impl Stage {
    /// All stages in invocation order.
    pub const ALL: [Stage; 3] = [Stage::Before, Stage::Main, Stage::After];
}

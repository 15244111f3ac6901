//! Epoch timing logs

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::info;

use super::traits::{Attachment, Binding};
use crate::event::{Event, Stage};
use crate::runner::{HandlerId, Runner};

/// Source of elapsed time
pub trait Timer {
    /// Start (or restart) measuring
    fn start(&mut self);

    /// Time since the last [`start`](Timer::start)
    fn elapsed(&self) -> Duration;
}

/// [`Timer`] backed by [`Instant`]
#[derive(Clone, Copy, Debug, Default)]
pub struct WallClock {
    started: Option<Instant>,
}

impl Timer for WallClock {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|t| t.elapsed()).unwrap_or_default()
    }
}

/// Logs the start of every epoch and how long it took
///
/// Runs of a single epoch are not logged. The duration of the last finished
/// epoch is available through [`last_elapsed`](EpochTimer::last_elapsed)
/// either way.
#[derive(Debug)]
pub struct EpochTimer<T = WallClock> {
    timer: Rc<RefCell<T>>,
    last_elapsed: Rc<RefCell<Option<Duration>>>,
    binding: Binding,
}

impl EpochTimer<WallClock> {
    pub fn new() -> Self {
        Self::with_timer(WallClock::default())
    }
}

impl Default for EpochTimer<WallClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Timer> EpochTimer<T> {
    pub fn with_timer(timer: T) -> Self {
        Self {
            timer: Rc::new(RefCell::new(timer)),
            last_elapsed: Rc::new(RefCell::new(None)),
            binding: Binding::default(),
        }
    }

    /// Duration of the most recently finished epoch
    pub fn last_elapsed(&self) -> Option<Duration> {
        *self.last_elapsed.borrow()
    }
}

impl<B: 'static, T: Timer + 'static> Attachment<B> for EpochTimer<T> {
    fn register(&mut self, runner: &mut Runner<B>) -> Vec<HandlerId> {
        let timer = Rc::clone(&self.timer);
        let start = runner.on_stage(Event::EpochStarted, Stage::Before, move |state| {
            let epoch = state.epoch().unwrap_or(0);
            if state.max_epoch() > 1 {
                info!("Starting epoch {epoch}/{}", state.max_epoch());
            }
            timer.borrow_mut().start();
            Ok(())
        });

        let timer = Rc::clone(&self.timer);
        let last_elapsed = Rc::clone(&self.last_elapsed);
        let finish = runner.on_stage(Event::EpochFinished, Stage::After, move |state| {
            let elapsed = timer.borrow().elapsed();
            *last_elapsed.borrow_mut() = Some(elapsed);
            if state.max_epoch() > 1 {
                let epoch = state.epoch().unwrap_or(0);
                info!("Epoch {epoch}/{} done in {}", state.max_epoch(), format_duration(elapsed));
            }
            Ok(())
        });

        vec![start, finish]
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }
}

/// Human-readable duration: `250ms`, `12.3s`, `4m 05s`, `2h 03m`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let s = (secs % 60.0).floor();
        format!("{mins}m {s:02.0}s")
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs % 3600.0) / 60.0).floor();
        format!("{hours}h {mins:02.0}m")
    }
}

//! Core trait and bookkeeping for attachments
//!
//! - `Attachment` - a bundle of handlers attached to a runner as a unit
//! - `Binding` - which runner an attachment is attached to, and with which handlers

use std::rc::Weak;

use crate::error::{Error, Result};
use crate::runner::{HandlerId, Runner};

/// Registration record of an attached attachment
///
/// A binding whose runner has been dropped counts as unbound.
#[derive(Clone, Debug, Default)]
pub struct Binding {
    attached: Option<Bound>,
}

#[derive(Clone, Debug)]
struct Bound {
    runner_id: u64,
    ids: Vec<HandlerId>,
    runner_alive: Weak<()>,
}

impl Bound {
    fn is_live(&self) -> bool {
        self.runner_alive.strong_count() > 0
    }
}

impl Binding {
    /// Whether the attachment currently owns handlers on a live runner
    pub fn is_bound(&self) -> bool {
        self.attached.as_ref().is_some_and(Bound::is_live)
    }

    /// Id of the runner the attachment is attached to
    pub fn runner_id(&self) -> Option<u64> {
        self.attached.as_ref().filter(|bound| bound.is_live()).map(|bound| bound.runner_id)
    }

    fn bind(&mut self, runner_id: u64, ids: Vec<HandlerId>, runner_alive: Weak<()>) {
        self.attached = Some(Bound { runner_id, ids, runner_alive });
    }

    fn release<B>(&mut self, runner: &mut Runner<B>) -> Result<()> {
        match &self.attached {
            None => Ok(()),
            Some(bound) if !bound.is_live() => {
                self.attached = None;
                Ok(())
            }
            Some(bound) if bound.runner_id != runner.id() => Err(Error::ForeignRunner),
            Some(_) => {
                if let Some(bound) = self.attached.take() {
                    for id in bound.ids {
                        runner.remove(id);
                    }
                }
                Ok(())
            }
        }
    }
}

/// A group of cooperating handlers attached to a [`Runner`] as a unit
///
/// Implementors provide [`register`](Attachment::register) and access to
/// their [`Binding`]; attaching and detaching come for free.
///
/// # Example
///
/// ```rust
/// use corredor::attachments::{Attachment, Binding};
/// use corredor::{Event, HandlerId, Runner};
///
/// #[derive(Default)]
/// struct BatchCounter {
///     binding: Binding,
/// }
///
/// impl<B: 'static> Attachment<B> for BatchCounter {
///     fn register(&mut self, runner: &mut Runner<B>) -> Vec<HandlerId> {
///         vec![
///             runner.on(Event::EpochStarted, |state| {
///                 state.set("n_batches", 0);
///                 Ok(())
///             }),
///             runner.on(Event::BatchFinished, |state| {
///                 let n = state.get_f64("n_batches")?;
///                 state.set("n_batches", n + 1.0);
///                 Ok(())
///             }),
///         ]
///     }
///
///     fn binding(&self) -> &Binding {
///         &self.binding
///     }
///
///     fn binding_mut(&mut self) -> &mut Binding {
///         &mut self.binding
///     }
/// }
///
/// let mut runner: Runner<u8> = Runner::new();
/// let mut counter = BatchCounter::default();
/// counter.attach_on(&mut runner).unwrap();
/// assert!(counter.attach_on(&mut runner).is_err());
///
/// let state = runner.run(vec![1, 2, 3], 1).unwrap();
/// assert_eq!(state.get_f64("n_batches").unwrap(), 3.0);
/// ```
pub trait Attachment<B> {
    /// Register this attachment's handlers and return their ids
    fn register(&mut self, runner: &mut Runner<B>) -> Vec<HandlerId>;

    fn binding(&self) -> &Binding;

    fn binding_mut(&mut self) -> &mut Binding;

    /// Attach to a runner
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyAttached`] if the attachment is attached already.
    fn attach_on(&mut self, runner: &mut Runner<B>) -> Result<()> {
        if self.binding().is_bound() {
            return Err(Error::AlreadyAttached);
        }
        let ids = self.register(runner);
        self.binding_mut().bind(runner.id(), ids, runner.liveness());
        Ok(())
    }

    /// Remove this attachment's handlers from the runner
    ///
    /// Detaching an attachment that is not attached, or whose runner has
    /// been dropped, is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::ForeignRunner`] if attached to a different runner.
    fn detach_from(&mut self, runner: &mut Runner<B>) -> Result<()> {
        self.binding_mut().release(runner)
    }

    fn is_attached(&self) -> bool {
        self.binding().is_bound()
    }
}

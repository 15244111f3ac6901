//! Handler registry shared between a runner and its hook handles

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::event::{Event, Stage};
use crate::state::State;

/// Signature of an event handler
pub type Handler<B> = dyn FnMut(&mut State<B>) -> anyhow::Result<()>;

type SharedHandler<B> = Rc<RefCell<Box<Handler<B>>>>;

static NEXT_RUNNER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one handler registration on one runner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId {
    runner: u64,
    seq: u64,
}

impl HandlerId {
    /// Id of the runner this handler was registered on
    pub fn runner_id(&self) -> u64 {
        self.runner
    }
}

struct Entry<B> {
    id: HandlerId,
    handler: SharedHandler<B>,
}

struct Registry<B> {
    runner_id: u64,
    next_seq: u64,
    handlers: HashMap<(Event, Stage), Vec<Entry<B>>>,
}

/// Handler registry owned by a runner
pub(crate) struct HandlerTable<B> {
    registry: Rc<RefCell<Registry<B>>>,
}

impl<B> HandlerTable<B> {
    pub(crate) fn new() -> Self {
        let registry = Registry {
            runner_id: NEXT_RUNNER_ID.fetch_add(1, Ordering::Relaxed),
            next_seq: 0,
            handlers: HashMap::new(),
        };
        Self { registry: Rc::new(RefCell::new(registry)) }
    }

    pub(crate) fn runner_id(&self) -> u64 {
        self.registry.borrow().runner_id
    }

    /// Weak handle that does not keep the registry alive
    pub(crate) fn hooks(&self) -> Hooks<B> {
        Hooks { runner_id: self.runner_id(), registry: Rc::downgrade(&self.registry) }
    }

    pub(crate) fn on_stage<F>(&self, event: Event, stage: Stage, handler: F) -> HandlerId
    where
        F: FnMut(&mut State<B>) -> anyhow::Result<()> + 'static,
    {
        register(&self.registry, event, stage, handler)
    }

    pub(crate) fn remove(&self, id: HandlerId) -> bool {
        remove(&self.registry, id)
    }

    pub(crate) fn handler_count(&self, event: Event, stage: Stage) -> usize {
        self.registry.borrow().handlers.get(&(event, stage)).map_or(0, Vec::len)
    }

    /// Invoke every handler of `event`, stage by stage, in registration order
    ///
    /// The handler list is captured before the first call, so handlers
    /// registered while this emission is in progress wait for the next one.
    pub(crate) fn emit(&self, event: Event, state: &mut State<B>) -> anyhow::Result<()> {
        let snapshot: Vec<SharedHandler<B>> = {
            let registry = self.registry.borrow();
            Stage::ALL
                .iter()
                .filter_map(|stage| registry.handlers.get(&(event, *stage)))
                .flatten()
                .map(|entry| Rc::clone(&entry.handler))
                .collect()
        };

        for handler in snapshot {
            let mut handler = handler.borrow_mut();
            (*handler)(state)?;
        }
        Ok(())
    }
}

fn register<B, F>(
    registry: &RefCell<Registry<B>>,
    event: Event,
    stage: Stage,
    handler: F,
) -> HandlerId
where
    F: FnMut(&mut State<B>) -> anyhow::Result<()> + 'static,
{
    let mut registry = registry.borrow_mut();
    let id = HandlerId { runner: registry.runner_id, seq: registry.next_seq };
    registry.next_seq += 1;
    let handler: Box<Handler<B>> = Box::new(handler);
    registry
        .handlers
        .entry((event, stage))
        .or_default()
        .push(Entry { id, handler: Rc::new(RefCell::new(handler)) });
    id
}

fn remove<B>(registry: &RefCell<Registry<B>>, id: HandlerId) -> bool {
    let mut registry = registry.borrow_mut();
    if id.runner != registry.runner_id {
        return false;
    }
    for entries in registry.handlers.values_mut() {
        if let Some(pos) = entries.iter().position(|e| e.id == id) {
            entries.remove(pos);
            return true;
        }
    }
    false
}

/// Cloneable handle to a runner's handler registry
///
/// Handlers receive only the run state, so a handler that wants to register
/// further handlers mid-run captures a `Hooks` obtained from
/// [`Runner::hooks`](crate::Runner::hooks). Such registrations take effect
/// from the next emission on.
///
/// The handle is weak: capturing it inside a handler does not keep the
/// runner's handlers alive, and once the runner is dropped registration
/// fails with [`Error::RunnerDropped`].
pub struct Hooks<B> {
    runner_id: u64,
    registry: Weak<RefCell<Registry<B>>>,
}

impl<B> Clone for Hooks<B> {
    fn clone(&self) -> Self {
        Self { runner_id: self.runner_id, registry: Weak::clone(&self.registry) }
    }
}

impl<B> Hooks<B> {
    /// Id of the owning runner
    pub fn runner_id(&self) -> u64 {
        self.runner_id
    }

    /// Whether the owning runner still exists
    pub fn is_alive(&self) -> bool {
        self.registry.strong_count() > 0
    }

    /// Register a handler in [`Stage::Main`]
    ///
    /// # Errors
    ///
    /// [`Error::RunnerDropped`] if the runner no longer exists.
    pub fn on<F>(&self, event: Event, handler: F) -> Result<HandlerId>
    where
        F: FnMut(&mut State<B>) -> anyhow::Result<()> + 'static,
    {
        self.on_stage(event, Stage::Main, handler)
    }

    /// Register a handler in the given stage of an event
    ///
    /// # Errors
    ///
    /// [`Error::RunnerDropped`] if the runner no longer exists.
    pub fn on_stage<F>(&self, event: Event, stage: Stage, handler: F) -> Result<HandlerId>
    where
        F: FnMut(&mut State<B>) -> anyhow::Result<()> + 'static,
    {
        let registry = self.registry.upgrade().ok_or(Error::RunnerDropped)?;
        Ok(register(&registry, event, stage, handler))
    }

    /// Remove a registration. Returns `false` if it was not found or the
    /// runner no longer exists.
    pub fn remove(&self, id: HandlerId) -> bool {
        self.registry.upgrade().is_some_and(|registry| remove(&registry, id))
    }

    /// Number of handlers registered for an event in one stage
    pub fn handler_count(&self, event: Event, stage: Stage) -> usize {
        self.registry.upgrade().map_or(0, |registry| {
            registry.borrow().handlers.get(&(event, stage)).map_or(0, Vec::len)
        })
    }
}

//! Per-epoch progress bar

use std::cell::RefCell;
use std::rc::Rc;

use indicatif::{ProgressDrawTarget, ProgressStyle};
use serde_json::Value;

use super::traits::{Attachment, Binding};
use crate::error::Error;
use crate::event::{Event, Stage};
use crate::runner::{HandlerId, Runner};
use crate::state::State;

const BAR_TEMPLATE: &str = "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{prefix} [{elapsed_precise}] {spinner} {pos} {msg}";

/// Progress bar over the batches of each epoch
///
/// A new bar is created when an epoch starts and finished when it ends. The
/// bar advances after every batch by `state[n_items]`, or by 1 when the key is
/// not set. When the batch iterator has no exact length a spinner is shown
/// instead. If `state[stats]` holds an object its entries are displayed as
/// the bar message.
pub struct ProgressBar {
    n_items_key: String,
    stats_key: Option<String>,
    hidden: bool,
    bar: Rc<RefCell<Option<indicatif::ProgressBar>>>,
    binding: Binding,
}

impl ProgressBar {
    pub fn new() -> Self {
        Self {
            n_items_key: "n_items".to_string(),
            stats_key: None,
            hidden: false,
            bar: Rc::new(RefCell::new(None)),
            binding: Binding::default(),
        }
    }

    /// Advance by `state[key]` instead of `state["n_items"]`
    pub fn n_items(mut self, key: impl Into<String>) -> Self {
        self.n_items_key = key.into();
        self
    }

    /// Show the entries of the object at `state[key]` next to the bar
    pub fn stats(mut self, key: impl Into<String>) -> Self {
        self.stats_key = Some(key.into());
        self
    }

    /// Track progress without drawing anything
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Position of the current (or last) epoch's bar
    pub fn position(&self) -> Option<u64> {
        self.bar.borrow().as_ref().map(indicatif::ProgressBar::position)
    }

    /// Length of the current (or last) epoch's bar; `None` for spinners
    pub fn length(&self) -> Option<u64> {
        self.bar.borrow().as_ref().and_then(indicatif::ProgressBar::length)
    }

    /// Message of the current (or last) epoch's bar
    pub fn message(&self) -> Option<String> {
        self.bar.borrow().as_ref().map(indicatif::ProgressBar::message)
    }

    pub fn is_finished(&self) -> bool {
        self.bar.borrow().as_ref().is_some_and(indicatif::ProgressBar::is_finished)
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressBar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBar")
            .field("n_items_key", &self.n_items_key)
            .field("stats_key", &self.stats_key)
            .field("hidden", &self.hidden)
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}

fn create_bar<B>(state: &State<B>, hidden: bool) -> anyhow::Result<indicatif::ProgressBar> {
    let len = state.epoch_len().map(|n| n as u64);
    let target = if hidden { ProgressDrawTarget::hidden() } else { ProgressDrawTarget::stderr() };
    let bar = indicatif::ProgressBar::with_draw_target(len, target);
    let template = if len.is_some() { BAR_TEMPLATE } else { SPINNER_TEMPLATE };
    bar.set_style(ProgressStyle::with_template(template)?.progress_chars("=> "));
    bar.set_prefix(format!("Epoch {}/{}", state.epoch().unwrap_or(0), state.max_epoch()));
    Ok(bar)
}

fn batch_increment<B>(state: &State<B>, key: &str) -> anyhow::Result<u64> {
    match state.get(key) {
        None => Ok(1),
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_f64().filter(|n| *n >= 0.0).map(|n| n.round() as u64))
            .ok_or_else(|| Error::type_mismatch(key, "non-negative number", value).into()),
    }
}

/// Render a stats object as `key: value` pairs
fn format_stats(key: &str, stats: &Value) -> anyhow::Result<String> {
    let Value::Object(entries) = stats else {
        return Err(Error::type_mismatch(key, "object", stats).into());
    };
    let parts: Vec<String> = entries
        .iter()
        .map(|(name, value)| match value {
            Value::Number(n) if n.is_f64() => format!("{name}: {:.4}", n.as_f64().unwrap_or_default()),
            Value::String(s) => format!("{name}: {s}"),
            other => format!("{name}: {other}"),
        })
        .collect();
    Ok(parts.join(", "))
}

impl<B: 'static> Attachment<B> for ProgressBar {
    fn register(&mut self, runner: &mut Runner<B>) -> Vec<HandlerId> {
        let slot = Rc::clone(&self.bar);
        let hidden = self.hidden;
        let start = runner.on_stage(Event::EpochStarted, Stage::After, move |state| {
            *slot.borrow_mut() = Some(create_bar(state, hidden)?);
            Ok(())
        });

        let slot = Rc::clone(&self.bar);
        let n_items_key = self.n_items_key.clone();
        let stats_key = self.stats_key.clone();
        let advance = runner.on_stage(Event::BatchFinished, Stage::After, move |state| {
            let slot = slot.borrow();
            let Some(bar) = slot.as_ref() else {
                return Ok(());
            };
            bar.inc(batch_increment(state, &n_items_key)?);
            if let Some(key) = &stats_key {
                if let Some(stats) = state.get(key) {
                    bar.set_message(format_stats(key, stats)?);
                }
            }
            Ok(())
        });

        let slot = Rc::clone(&self.bar);
        let finish = runner.on_stage(Event::EpochFinished, Stage::After, move |_| {
            if let Some(bar) = slot.borrow().as_ref() {
                bar.finish();
            }
            Ok(())
        });

        vec![start, advance, finish]
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }
}

//! Reducers folding per-batch values into one value per epoch
//!
//! A [`Reducer`] accumulates values from batch states; a [`Reduction`]
//! attaches it to a runner and publishes the result under a state key:
//!
//! - `EpochStarted` (before user handlers): reset
//! - `Batch` (after user handlers): fold the batch's value
//! - `EpochFinished` (before user handlers): write the result to `state[name]`
//!
//! An epoch without batches publishes `null`.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use super::traits::{Attachment, Binding};
use crate::event::{Event, Stage};
use crate::runner::{HandlerId, Runner};
use crate::state::State;

/// Folds batch values into a summary
pub trait Reducer<B> {
    /// Forget everything accumulated so far
    fn reset(&mut self);

    /// Fold the value of the current batch
    fn update(&mut self, state: &State<B>) -> anyhow::Result<()>;

    /// Summary of everything folded since the last reset
    fn compute(&mut self) -> anyhow::Result<Value>;
}

/// Reduces with a user-supplied binary function
///
/// The first value seeds the accumulator; every further value is combined
/// with `reduce_fn(accumulator, value)`.
pub struct LambdaReducer<F> {
    value_key: String,
    reduce_fn: F,
    acc: Option<Value>,
}

impl<F> LambdaReducer<F>
where
    F: FnMut(Value, Value) -> anyhow::Result<Value>,
{
    pub fn new(reduce_fn: F) -> Self {
        Self { value_key: "output".to_string(), reduce_fn, acc: None }
    }

    /// Read batch values from `state[key]` instead of `state["output"]`
    pub fn value(mut self, key: impl Into<String>) -> Self {
        self.value_key = key.into();
        self
    }
}

impl<B, F> Reducer<B> for LambdaReducer<F>
where
    F: FnMut(Value, Value) -> anyhow::Result<Value>,
{
    fn reset(&mut self) {
        self.acc = None;
    }

    fn update(&mut self, state: &State<B>) -> anyhow::Result<()> {
        let value = state.require(&self.value_key)?.clone();
        self.acc = Some(match self.acc.take() {
            None => value,
            Some(acc) => (self.reduce_fn)(acc, value)?,
        });
        Ok(())
    }

    fn compute(&mut self) -> anyhow::Result<Value> {
        Ok(self.acc.take().unwrap_or(Value::Null))
    }
}

/// Sum of numeric batch values
#[derive(Clone, Debug)]
pub struct SumReducer {
    value_key: String,
    sum: Option<f64>,
}

impl SumReducer {
    pub fn new() -> Self {
        Self { value_key: "output".to_string(), sum: None }
    }

    /// Read batch values from `state[key]` instead of `state["output"]`
    pub fn value(mut self, key: impl Into<String>) -> Self {
        self.value_key = key.into();
        self
    }
}

impl Default for SumReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Reducer<B> for SumReducer {
    fn reset(&mut self) {
        self.sum = None;
    }

    fn update(&mut self, state: &State<B>) -> anyhow::Result<()> {
        let value = state.get_f64(&self.value_key)?;
        self.sum = Some(self.sum.unwrap_or(0.0) + value);
        Ok(())
    }

    fn compute(&mut self) -> anyhow::Result<Value> {
        Ok(self.sum.take().map_or(Value::Null, Value::from))
    }
}

/// Mean of numeric batch values, weighted by batch size
///
/// The divisor is the sum of `state[size]` over all batches, where a batch
/// without that key counts as size 1.
#[derive(Clone, Debug)]
pub struct MeanReducer {
    value_key: String,
    size_key: String,
    sum: f64,
    total_size: f64,
    n_batches: usize,
}

impl MeanReducer {
    pub fn new() -> Self {
        Self {
            value_key: "output".to_string(),
            size_key: "size".to_string(),
            sum: 0.0,
            total_size: 0.0,
            n_batches: 0,
        }
    }

    /// Read batch values from `state[key]` instead of `state["output"]`
    pub fn value(mut self, key: impl Into<String>) -> Self {
        self.value_key = key.into();
        self
    }

    /// Read batch sizes from `state[key]` instead of `state["size"]`
    pub fn size(mut self, key: impl Into<String>) -> Self {
        self.size_key = key.into();
        self
    }
}

impl Default for MeanReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Reducer<B> for MeanReducer {
    fn reset(&mut self) {
        self.sum = 0.0;
        self.total_size = 0.0;
        self.n_batches = 0;
    }

    fn update(&mut self, state: &State<B>) -> anyhow::Result<()> {
        self.sum += state.get_f64(&self.value_key)?;
        self.total_size += if state.contains_key(&self.size_key) {
            state.get_f64(&self.size_key)?
        } else {
            1.0
        };
        self.n_batches += 1;
        Ok(())
    }

    fn compute(&mut self) -> anyhow::Result<Value> {
        if self.n_batches == 0 || self.total_size == 0.0 {
            return Ok(Value::Null);
        }
        Ok(Value::from(self.sum / self.total_size))
    }
}

/// Attaches a [`Reducer`] and publishes its result as `state[name]`
///
/// # Example
///
/// ```rust
/// use corredor::attachments::{Attachment, Reduction};
/// use corredor::{Event, Runner};
///
/// let mut runner: Runner<f64> = Runner::new();
/// runner.on(Event::Batch, |state| {
///     let batch = state.batch().copied().unwrap_or_default();
///     state.set("output", batch);
///     Ok(())
/// });
/// Reduction::mean("mean").attach_on(&mut runner).unwrap();
///
/// let state = runner.run(vec![1.0, 2.0, 3.0], 1).unwrap();
/// assert_eq!(state.get_f64("mean").unwrap(), 2.0);
/// ```
pub struct Reduction<R> {
    name: String,
    reducer: Rc<RefCell<R>>,
    binding: Binding,
}

impl<R> Reduction<R> {
    pub fn new(name: impl Into<String>, reducer: R) -> Self {
        Self { name: name.into(), reducer: Rc::new(RefCell::new(reducer)), binding: Binding::default() }
    }

    /// State key the result is written to
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Reduction<MeanReducer> {
    /// Mean of `state["output"]` published as `state[name]`
    pub fn mean(name: impl Into<String>) -> Self {
        Self::new(name, MeanReducer::new())
    }
}

impl Reduction<SumReducer> {
    /// Sum of `state["output"]` published as `state[name]`
    pub fn sum(name: impl Into<String>) -> Self {
        Self::new(name, SumReducer::new())
    }
}

impl<F> Reduction<LambdaReducer<F>>
where
    F: FnMut(Value, Value) -> anyhow::Result<Value>,
{
    /// Fold of `state["output"]` with `reduce_fn` published as `state[name]`
    pub fn lambda(name: impl Into<String>, reduce_fn: F) -> Self {
        Self::new(name, LambdaReducer::new(reduce_fn))
    }
}

impl<B, R> Attachment<B> for Reduction<R>
where
    B: 'static,
    R: Reducer<B> + 'static,
{
    fn register(&mut self, runner: &mut Runner<B>) -> Vec<HandlerId> {
        let reducer = Rc::clone(&self.reducer);
        let reset = runner.on_stage(Event::EpochStarted, Stage::Before, move |_| {
            reducer.borrow_mut().reset();
            Ok(())
        });

        let reducer = Rc::clone(&self.reducer);
        let update = runner.on_stage(Event::Batch, Stage::After, move |state| {
            reducer.borrow_mut().update(state)
        });

        let reducer = Rc::clone(&self.reducer);
        let name = self.name.clone();
        let compute = runner.on_stage(Event::EpochFinished, Stage::Before, move |state| {
            let result = reducer.borrow_mut().compute()?;
            state.set(name.clone(), result);
            Ok(())
        });

        vec![reset, update, compute]
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }
}

//! Run state shared by every handler of a run

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Mutable state of a single run
///
/// The runner keeps its bookkeeping in typed fields; everything handlers
/// want to share goes into the string-keyed value map. A key written by one
/// handler is visible to every handler invoked after it in the same run.
///
/// # Example
///
/// ```rust
/// use corredor::{Event, Runner};
///
/// let mut runner: Runner<i32> = Runner::new();
/// runner.on(Event::Batch, |state| {
///     let batch = *state.batch().expect("batch is set during batch events");
///     state.set("output", batch * 2);
///     Ok(())
/// });
/// let state = runner.run(vec![1, 2, 3], 1).unwrap();
/// assert_eq!(state.get_f64("output").unwrap(), 6.0);
/// ```
#[derive(Clone, Debug)]
pub struct State<B> {
    pub(crate) epoch: Option<usize>,
    pub(crate) max_epoch: usize,
    pub(crate) n_iters: usize,
    pub(crate) batch: Option<B>,
    pub(crate) batch_index: Option<usize>,
    pub(crate) epoch_len: Option<usize>,
    pub(crate) running: bool,
    values: Map<String, Value>,
}

impl<B> State<B> {
    pub(crate) fn new(max_epoch: usize) -> Self {
        Self {
            epoch: None,
            max_epoch,
            n_iters: 0,
            batch: None,
            batch_index: None,
            epoch_len: None,
            running: true,
            values: Map::new(),
        }
    }

    /// Current epoch, 1-based. `None` during `Started` and `Finished`.
    pub fn epoch(&self) -> Option<usize> {
        self.epoch
    }

    /// Maximum number of epochs requested for this run
    pub fn max_epoch(&self) -> usize {
        self.max_epoch
    }

    /// Number of batches processed so far in the run
    pub fn n_iters(&self) -> usize {
        self.n_iters
    }

    /// Current batch. Only set during the three batch events.
    pub fn batch(&self) -> Option<&B> {
        self.batch.as_ref()
    }

    /// 0-based index of the current batch within its epoch
    pub fn batch_index(&self) -> Option<usize> {
        self.batch_index
    }

    /// Number of batches in an epoch, when the batch iterator reports an exact size
    pub fn epoch_len(&self) -> Option<usize> {
        self.epoch_len
    }

    /// Whether the run continues after the current batch or epoch
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Request the runner to stop
    ///
    /// The remaining batches of the current epoch are skipped, then
    /// `EpochFinished` and `Finished` are still emitted.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a value by key, failing with [`Error::MissingKey`] when absent
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.values.get(key).ok_or_else(|| Error::MissingKey(key.to_string()))
    }

    /// Read a numeric value
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        value.as_f64().ok_or_else(|| Error::type_mismatch(key, "number", value))
    }

    /// Deserialize a value into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.require(key)?;
        Ok(T::deserialize(value)?)
    }

    /// Store a value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Serialize `value` and store it
    pub fn set_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        self.values.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Remove a value, returning it
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All handler-written values
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consume the state, keeping only the handler-written values
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

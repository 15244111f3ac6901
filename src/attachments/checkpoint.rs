//! Checkpoint attachment for saving run artifacts at epoch end

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info};

use super::improvement::{display_value, read_monitored, Improvement, Mode};
use super::traits::{Attachment, Binding};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::runner::{HandlerId, Runner};
use crate::state::State;

/// Function that persists one checkpoint object to a path
pub type SaveFn = dyn Fn(&Value, &Path) -> anyhow::Result<()>;

/// Checkpoint attachment
///
/// At every `EpochFinished` reads `state[checkpoint_key]`, a JSON object
/// mapping file names to the objects to save, and writes each entry to
/// `{save_dir}/{n}_{name}`, where `n` counts calls over the checkpointer's
/// lifetime, so it keeps increasing across runs. Only the newest `max_saved`
/// checkpoints are kept on disk, including ones written by earlier runs.
///
/// With [`monitor`](Checkpointer::monitor) set, a checkpoint is written only
/// when the monitored value improves on the best seen so far in the run.
///
/// # Example
///
/// ```rust
/// use corredor::attachments::{Attachment, Checkpointer};
/// use corredor::{Event, Runner};
/// use serde_json::json;
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut runner: Runner<u8> = Runner::new();
/// runner.on(Event::EpochFinished, |state| {
///     let epoch = state.epoch().unwrap_or(0);
///     state.set("checkpoint", json!({ "model.json": { "epoch": epoch } }));
///     Ok(())
/// });
/// let mut ckpt = Checkpointer::new(dir.path()).max_saved(2);
/// ckpt.attach_on(&mut runner).unwrap();
///
/// runner.run(vec![0, 1], 5).unwrap();
/// assert!(dir.path().join("5_model.json").exists());
/// assert!(dir.path().join("4_model.json").exists());
/// assert!(!dir.path().join("3_model.json").exists());
/// ```
pub struct Checkpointer {
    save_dir: PathBuf,
    checkpoint_key: String,
    max_saved: usize,
    save_fn: Rc<SaveFn>,
    monitor: Option<String>,
    modes: Vec<Mode>,
    eps: f64,
    log: Rc<RefCell<CheckpointLog>>,
    binding: Binding,
}

#[derive(Debug, Default)]
struct CheckpointLog {
    n_calls: usize,
    saved: VecDeque<Vec<PathBuf>>,
    improvement: Option<Improvement>,
}

impl Checkpointer {
    /// Save checkpoints under `save_dir`
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            checkpoint_key: "checkpoint".to_string(),
            max_saved: 1,
            save_fn: Rc::new(save_json),
            monitor: None,
            modes: vec![Mode::Min],
            eps: 1e-4,
            log: Rc::default(),
            binding: Binding::default(),
        }
    }

    /// Read the checkpoint object from `state[key]`
    pub fn checkpoint_key(mut self, key: impl Into<String>) -> Self {
        self.checkpoint_key = key.into();
        self
    }

    /// Keep at most `n` checkpoints on disk (at least one)
    pub fn max_saved(mut self, n: usize) -> Self {
        self.max_saved = n.max(1);
        self
    }

    /// Replace the default JSON writer
    pub fn save_fn<F>(mut self, save_fn: F) -> Self
    where
        F: Fn(&Value, &Path) -> anyhow::Result<()> + 'static,
    {
        self.save_fn = Rc::new(save_fn);
        self
    }

    /// Only save when `state[key]` improves
    pub fn monitor(mut self, key: impl Into<String>) -> Self {
        self.monitor = Some(key.into());
        self
    }

    /// Direction of improvement for the monitored value
    pub fn mode(mut self, mode: Mode) -> Self {
        self.modes = vec![mode];
        self
    }

    /// One direction per element when the monitored value is an array
    pub fn modes(mut self, modes: Vec<Mode>) -> Self {
        self.modes = modes;
        self
    }

    /// Minimum change of the monitored value that counts as improvement
    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Path of the file `name` for call number `n`
    pub fn checkpoint_path(&self, n: usize, name: &str) -> PathBuf {
        checkpoint_path(&self.save_dir, n, name)
    }

    /// Files of the checkpoints currently kept, oldest first
    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.log.borrow().saved.iter().flatten().cloned().collect()
    }
}

impl fmt::Debug for Checkpointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpointer")
            .field("save_dir", &self.save_dir)
            .field("checkpoint_key", &self.checkpoint_key)
            .field("max_saved", &self.max_saved)
            .field("monitor", &self.monitor)
            .field("modes", &self.modes)
            .field("eps", &self.eps)
            .finish_non_exhaustive()
    }
}

/// Everything the epoch-end handler needs, detached from the builder
struct CheckpointJob {
    save_dir: PathBuf,
    checkpoint_key: String,
    max_saved: usize,
    save_fn: Rc<SaveFn>,
    monitor: Option<String>,
    log: Rc<RefCell<CheckpointLog>>,
}

impl CheckpointJob {
    fn on_epoch_finished<B>(&self, state: &State<B>) -> anyhow::Result<()> {
        let mut log = self.log.borrow_mut();
        log.n_calls += 1;
        let n = log.n_calls;

        let checkpoint = state.require(&self.checkpoint_key)?;
        let objects = checkpoint
            .as_object()
            .ok_or_else(|| Error::type_mismatch(&self.checkpoint_key, "object", checkpoint))?;

        if self.should_save(state, &mut log)? {
            fs::create_dir_all(&self.save_dir)
                .map_err(|e| Error::io_at("Creating checkpoint directory", &self.save_dir, e))?;
            let mut paths = Vec::with_capacity(objects.len());
            for (name, object) in objects {
                let path = checkpoint_path(&self.save_dir, n, name);
                info!("Saving to {}", path.display());
                (self.save_fn)(object, &path)?;
                paths.push(path);
            }
            log.saved.push_back(paths);
        }

        while log.saved.len() > self.max_saved {
            if let Some(paths) = log.saved.pop_front() {
                for path in paths {
                    remove_if_exists(&path)?;
                }
            }
        }
        Ok(())
    }

    fn should_save<B>(&self, state: &State<B>, log: &mut CheckpointLog) -> Result<bool> {
        let (Some(key), Some(improvement)) = (&self.monitor, log.improvement.as_mut()) else {
            return Ok(true);
        };
        let value = read_monitored(state, key)?;
        if improvement.observe(&value) {
            info!("Found new best {key} of {}", display_value(&value));
            Ok(true)
        } else {
            debug!("{key} did not improve, skipping checkpoint");
            Ok(false)
        }
    }
}

impl<B: 'static> Attachment<B> for Checkpointer {
    fn register(&mut self, runner: &mut Runner<B>) -> Vec<HandlerId> {
        let log = Rc::clone(&self.log);
        let improvement =
            self.monitor.as_ref().map(|_| Improvement::with_modes(self.modes.clone(), self.eps));
        let reset = runner.on(Event::Started, move |_| {
            log.borrow_mut().improvement = improvement.clone();
            Ok(())
        });

        let job = CheckpointJob {
            save_dir: self.save_dir.clone(),
            checkpoint_key: self.checkpoint_key.clone(),
            max_saved: self.max_saved,
            save_fn: Rc::clone(&self.save_fn),
            monitor: self.monitor.clone(),
            log: Rc::clone(&self.log),
        };
        let save = runner.on(Event::EpochFinished, move |state| job.on_epoch_finished(state));

        vec![reset, save]
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }
}

fn checkpoint_path(save_dir: &Path, n: usize, name: &str) -> PathBuf {
    save_dir.join(format!("{n}_{name}"))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_at("Removing old checkpoint", path, e)),
    }
}

/// Default save function: pretty-printed JSON
pub fn save_json(value: &Value, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).map_err(|e| Error::io_at("Creating", path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(Error::from)?;
    writer.flush().map_err(|e| Error::io_at("Writing", path, e))?;
    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Checkpoint paths are `{n}_{name}` under the save directory
        #[test]
        fn checkpoint_paths_are_consistent(n in 0usize..1000, name in "[a-z]{1,8}\\.json") {
            let ckpt = Checkpointer::new("/tmp/test");
            let expected = PathBuf::from(format!("/tmp/test/{n}_{name}"));
            prop_assert_eq!(ckpt.checkpoint_path(n, &name), expected);
        }
    }
}

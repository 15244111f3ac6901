//! Run command implementation

use std::fmt;
use std::path::PathBuf;

use anyhow::Context;
use serde_json::{Map, Value};
use tracing::debug;

use crate::attachments::{
    Attachment, Checkpointer, EarlyStopper, EpochTimer, MeanReducer, ProgressBar, Reduction,
    SumReducer,
};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, validate_config, RunArgs, RunSpec, ValidationError};
use crate::event::Event;
use crate::runner::Runner;

/// Outcome of a configured run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Epochs that ran, including one cut short by a stop
    pub epochs_run: usize,
    /// Batches processed
    pub n_iters: usize,
    /// Whether a handler requested stop before `max_epoch` was reached
    pub stopped_early: bool,
    /// Final value of every reducer, by name
    pub results: Map<String, Value>,
    /// Checkpoint files left on disk
    pub checkpoints: Vec<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary:")?;
        writeln!(f, "  Epochs: {}", self.epochs_run)?;
        writeln!(f, "  Batches: {}", self.n_iters)?;
        if self.stopped_early {
            writeln!(f, "  Stopped early: yes")?;
        }
        for (name, value) in &self.results {
            match value.as_f64() {
                Some(v) => writeln!(f, "  {name}: {v:.6}")?,
                None => writeln!(f, "  {name}: {value}")?,
            }
        }
        for path in &self.checkpoints {
            writeln!(f, "  Checkpoint: {}", path.display())?;
        }
        Ok(())
    }
}

/// Apply command line overrides to a loaded spec
fn apply_overrides(spec: &mut RunSpec, args: &RunArgs) {
    if let Some(epochs) = args.epochs {
        spec.max_epoch = epochs;
    }
    if let Some(dir) = &args.checkpoint_dir {
        if let Some(ckpt) = spec.checkpoint.as_mut() {
            ckpt.dir = dir.clone();
        }
    }
    if args.no_progress {
        spec.progress = false;
    }
}

/// Synthetic batch output: `max(batch * decay^(epoch - 1), floor)`
fn batch_output(batch: f64, epoch: usize, decay: f64, floor: f64) -> f64 {
    let exponent = i32::try_from(epoch.saturating_sub(1)).unwrap_or(i32::MAX);
    (batch * decay.powi(exponent)).max(floor)
}

fn attach_reducers(spec: &RunSpec, runner: &mut Runner<f64>) -> anyhow::Result<()> {
    for reducer in &spec.reducers {
        match reducer.kind.as_str() {
            "mean" => Reduction::new(&reducer.name, MeanReducer::new().value(&reducer.value))
                .attach_on(runner)?,
            "sum" => Reduction::new(&reducer.name, SumReducer::new().value(&reducer.value))
                .attach_on(runner)?,
            other => return Err(ValidationError::InvalidReducerKind(other.to_string()).into()),
        }
    }
    Ok(())
}

/// Build a runner for `spec`, run it and summarize the result
///
/// The spec is expected to be validated.
pub fn execute_spec(spec: &RunSpec) -> anyhow::Result<RunSummary> {
    let mut runner: Runner<f64> = Runner::new();

    let (decay, floor, batch_size) = (spec.decay, spec.floor, spec.batch_size);
    runner.on(Event::Batch, move |state| {
        let batch = state.batch().copied().unwrap_or_default();
        let output = batch_output(batch, state.epoch().unwrap_or(1), decay, floor);
        state.set("output", output);
        state.set("stats", serde_json::json!({ "output": output }));
        if let Some(n) = batch_size {
            state.set("size", n);
            state.set("n_items", n);
        }
        Ok(())
    });
    runner.on(Event::EpochFinished, |state| {
        state.set("epochs_run", state.epoch().unwrap_or(0));
        Ok(())
    });

    attach_reducers(spec, &mut runner)?;

    let mut checkpointer = None;
    if let Some(ckpt) = &spec.checkpoint {
        let names: Vec<String> = spec.reducers.iter().map(|r| r.name.clone()).collect();
        runner.on(Event::EpochFinished, move |state| {
            let mut payload = Map::new();
            payload.insert("epoch".to_string(), Value::from(state.epoch().unwrap_or(0)));
            payload.insert("n_iters".to_string(), Value::from(state.n_iters()));
            for name in &names {
                payload.insert(name.clone(), state.get(name).cloned().unwrap_or(Value::Null));
            }
            let mut checkpoint = Map::new();
            checkpoint.insert("state.json".to_string(), Value::Object(payload));
            state.set("checkpoint", Value::Object(checkpoint));
            Ok(())
        });

        let mut attachment = Checkpointer::new(&ckpt.dir).max_saved(ckpt.max_saved).mode(ckpt.mode);
        if let Some(monitor) = &ckpt.monitor {
            attachment = attachment.monitor(monitor);
        }
        attachment.attach_on(&mut runner)?;
        checkpointer = Some(attachment);
    }

    if let Some(es) = &spec.early_stopping {
        EarlyStopper::new(es.patience)
            .monitor(&es.monitor)
            .mode(es.mode)
            .eps(es.eps)
            .attach_on(&mut runner)?;
    }

    if spec.progress {
        ProgressBar::new().stats("stats").attach_on(&mut runner)?;
    }
    if spec.log_epoch_time {
        EpochTimer::new().attach_on(&mut runner)?;
    }

    debug!(max_epoch = spec.max_epoch, n_batches = spec.batches.len(), "starting configured run");
    let state = runner.run(spec.batches.clone(), spec.max_epoch)?;

    let epochs_run = state.get_as::<usize>("epochs_run").unwrap_or(0);
    let results = spec
        .reducers
        .iter()
        .filter_map(|r| state.get(&r.name).map(|v| (r.name.clone(), v.clone())))
        .collect();

    Ok(RunSummary {
        epochs_run,
        n_iters: state.n_iters(),
        stopped_early: !state.is_running() && epochs_run < spec.max_epoch,
        results,
        checkpoints: checkpointer.map(|c| c.saved_paths()).unwrap_or_default(),
    })
}

pub fn run_run(args: RunArgs, level: LogLevel) -> anyhow::Result<()> {
    log(level, LogLevel::Normal, &format!("Loading config: {}", args.config.display()));

    let mut spec = load_config(&args.config).context("Config error")?;
    apply_overrides(&mut spec, &args);
    if level == LogLevel::Quiet {
        spec.progress = false;
    }
    validate_config(&spec).context("Validation failed")?;

    log(
        level,
        LogLevel::Verbose,
        &format!("  {} epochs over {} batches", spec.max_epoch, spec.batches.len()),
    );

    let summary = execute_spec(&spec)?;
    log(level, LogLevel::Normal, summary.to_string().trim_end());
    Ok(())
}

//! Integration tests for the demo YAML configurations
//!
//! Every file under `demos/` must load, validate and run.

use corredor::cli::execute_spec;
use corredor::config::{load_and_validate, load_config, validate_config, RunSpec};
use std::path::{Path, PathBuf};

fn demo_path(filename: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(filename)
}

fn load_demo(filename: &str) -> RunSpec {
    let spec = load_config(demo_path(filename))
        .unwrap_or_else(|e| panic!("Failed to load {filename}: {e}"));
    validate_config(&spec).unwrap_or_else(|e| panic!("Failed to validate {filename}: {e}"));
    spec
}

/// Demo spec with all terminal output disabled
fn quiet_demo(filename: &str) -> RunSpec {
    let mut spec = load_demo(filename);
    spec.progress = false;
    spec.log_epoch_time = false;
    spec
}

#[test]
fn demos_all_validate() {
    for filename in ["basic.yaml", "early_stopping.yaml", "checkpoints.yaml"] {
        let spec = load_demo(filename);
        assert!(spec.max_epoch > 0, "{filename}: max_epoch must be > 0");
        assert!(!spec.batches.is_empty(), "{filename}: batches must not be empty");
    }
}

#[test]
fn basic_demo_runs_every_epoch() {
    let summary = execute_spec(&quiet_demo("basic.yaml")).expect("operation should succeed");

    assert_eq!(summary.epochs_run, 3);
    assert_eq!(summary.n_iters, 12);
    assert!(!summary.stopped_early);

    // last epoch: outputs scaled by 0.8^2
    let scale = 0.8f64 * 0.8;
    let loss = summary.results["loss"].as_f64().expect("loss should be a number");
    let total = summary.results["total"].as_f64().expect("total should be a number");
    assert!((loss - 0.6 * scale).abs() < 1e-12);
    assert!((total - 2.4 * scale).abs() < 1e-12);
}

#[test]
fn early_stopping_demo_stops_on_plateau() {
    let summary =
        execute_spec(&quiet_demo("early_stopping.yaml")).expect("operation should succeed");

    // loss reaches the floor at epoch 7, then 3 epochs of patience
    assert_eq!(summary.epochs_run, 10);
    assert_eq!(summary.n_iters, 20);
    assert!(summary.stopped_early);
    let loss = summary.results["loss"].as_f64().expect("loss should be a number");
    assert!((loss - 0.05).abs() < 1e-12);
}

#[test]
fn checkpoint_demo_keeps_two_best() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let mut spec = quiet_demo("checkpoints.yaml");
    if let Some(ckpt) = spec.checkpoint.as_mut() {
        ckpt.dir = dir.path().join("ckpt");
    }

    let summary = execute_spec(&spec).expect("operation should succeed");

    let expected = vec![dir.path().join("ckpt/5_state.json"), dir.path().join("ckpt/6_state.json")];
    assert_eq!(summary.checkpoints, expected);
    for path in &expected {
        assert!(path.exists(), "{} should exist", path.display());
    }
    let remaining = std::fs::read_dir(dir.path().join("ckpt"))
        .expect("checkpoint dir should exist")
        .count();
    assert_eq!(remaining, 2);
}

#[test]
fn missing_demo_reports_path() {
    let err = load_and_validate(demo_path("nope.yaml")).unwrap_err();
    assert!(err.to_string().contains("nope.yaml"));
}

//! Runner integration tests
//!
//! Exercise the public API with several attachments cooperating on one run.

use std::cell::RefCell;
use std::rc::Rc;

use corredor::attachments::{
    Attachment, Checkpointer, EarlyStopper, EpochTimer, MeanReducer, Mode, ProgressBar, Reduction,
};
use corredor::{Event, Runner, Stage};
use serde_json::{json, Value};

/// Batches are `(prediction, target)` pairs; loss is the squared error
fn regression_runner(shift: Rc<RefCell<f64>>) -> Runner<(f64, f64)> {
    let mut runner = Runner::new();
    runner.on(Event::Batch, move |state| {
        let (prediction, target) = state.batch().copied().unwrap_or_default();
        let error = prediction * *shift.borrow() - target;
        state.set("output", error * error);
        Ok(())
    });
    runner
}

#[test]
fn attachments_cooperate_in_one_run() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let shift = Rc::new(RefCell::new(0.0));
    let mut runner = regression_runner(Rc::clone(&shift));

    // the "model" moves towards the target until epoch 4, then drifts away
    let model = Rc::clone(&shift);
    runner.on(Event::EpochFinished, move |state| {
        let epoch = state.epoch().unwrap_or(0) as f64;
        *model.borrow_mut() = if epoch < 4.0 { epoch * 0.25 } else { 1.0 + (epoch - 3.0) * 0.5 };
        let loss = state.get_f64("loss")?;
        state.set("checkpoint", json!({ "model.json": { "loss": loss } }));
        Ok(())
    });

    Reduction::mean("loss").attach_on(&mut runner).expect("attach should succeed");
    let mut checkpointer = Checkpointer::new(dir.path()).monitor("loss").max_saved(1);
    checkpointer.attach_on(&mut runner).expect("attach should succeed");
    let mut stopper = EarlyStopper::new(2);
    stopper.attach_on(&mut runner).expect("attach should succeed");
    let mut progress = ProgressBar::new().hidden(true);
    progress.attach_on(&mut runner).expect("attach should succeed");
    let mut timer = EpochTimer::new();
    timer.attach_on(&mut runner).expect("attach should succeed");

    let batches = vec![(1.0, 1.0), (2.0, 2.0), (4.0, 4.0)];
    let state = runner.run(batches, 20).expect("run should succeed");

    // shift per epoch: 0, .25, .5, .75, 1.5, 2.0; best loss at epoch 4
    assert_eq!(state.n_iters(), 6 * 3);
    assert!(!state.is_running());
    assert_eq!(stopper.epochs_without_improvement(), 2);
    assert_eq!(checkpointer.saved_paths(), vec![dir.path().join("4_model.json")]);
    assert_eq!(progress.position(), Some(3));
    assert!(timer.last_elapsed().is_some());
}

#[test]
fn batch_fires_epochs_times_batches() {
    for (max_epoch, n_batches) in [(0usize, 3usize), (1, 0), (3, 4), (5, 1)] {
        let count = Rc::new(RefCell::new(0usize));
        let mut runner: Runner<usize> = Runner::new();
        let counter = Rc::clone(&count);
        runner.on(Event::Batch, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        let state = runner.run(0..n_batches, max_epoch).expect("run should succeed");
        assert_eq!(*count.borrow(), max_epoch * n_batches);
        assert_eq!(state.n_iters(), max_epoch * n_batches);
    }
}

#[test]
fn weighted_mean_with_custom_keys() {
    let mut runner: Runner<Vec<f64>> = Runner::new();
    runner.on(Event::Batch, |state| {
        let values = state.batch().cloned().unwrap_or_default();
        state.set("batch_loss", values.iter().sum::<f64>());
        state.set("batch_len", values.len());
        Ok(())
    });
    Reduction::new("loss", MeanReducer::new().value("batch_loss").size("batch_len"))
        .attach_on(&mut runner)
        .expect("attach should succeed");

    let state = runner
        .run(vec![vec![1.0, 2.0, 3.0], vec![4.0]], 1)
        .expect("run should succeed");
    assert_eq!(state.get_f64("loss").expect("loss should be set"), 2.5);
}

#[test]
fn stage_order_lets_user_handlers_see_aggregates() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut runner: Runner<f64> = Runner::new();
    let log = Rc::clone(&seen);
    runner.on_stage(Event::EpochFinished, Stage::After, move |state| {
        log.borrow_mut().push(format!("after {}", state.get_f64("mean")?));
        Ok(())
    });
    let log = Rc::clone(&seen);
    runner.on(Event::EpochFinished, move |state| {
        log.borrow_mut().push(format!("main {}", state.get_f64("mean")?));
        Ok(())
    });
    runner.on(Event::Batch, |state| {
        let batch = state.batch().copied().unwrap_or_default();
        state.set("output", batch);
        Ok(())
    });
    Reduction::mean("mean").attach_on(&mut runner).expect("attach should succeed");

    runner.run(vec![1.0, 3.0], 1).expect("run should succeed");
    assert_eq!(*seen.borrow(), vec!["main 2".to_string(), "after 2".to_string()]);
}

#[test]
fn detached_attachments_leave_no_handlers() {
    let mut runner: Runner<f64> = Runner::new();
    let mut mean = Reduction::mean("mean");
    let mut stopper = EarlyStopper::new(3).mode(Mode::Max);
    mean.attach_on(&mut runner).expect("attach should succeed");
    stopper.attach_on(&mut runner).expect("attach should succeed");
    assert_eq!(runner.handler_count(Event::EpochFinished), 2);

    mean.detach_from(&mut runner).expect("detach should succeed");
    stopper.detach_from(&mut runner).expect("detach should succeed");
    for event in Event::ALL {
        assert_eq!(runner.handler_count(event), 0, "{event} still has handlers");
    }

    let state = runner.run(vec![1.0], 2).expect("run should succeed");
    assert_eq!(state.get("mean"), None::<&Value>);
}

mod common;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use common::{counting_batches, counting_dataset, FailAt, ProbeTask, Recorder, SharedBuf, StopAt};
use ferrite_train::data::Data;
use ferrite_train::device::StaticProbe;
use ferrite_train::{
    Activation, Batch, Batches, Callback, CallbackContext, CrossEntropyLoss, Device, DisplayMode, EarlyStopping,
    Metrics, Module, MseLoss, ProgressCallback, Result, RunState, Sequential, Sgd, Task, Tensor,
    TensorDataset, TrainConfig, TrainError, Trainer,
};

use approx::assert_relative_eq;

fn quiet(num_epochs: usize) -> TrainConfig {
    TrainConfig::new(num_epochs)
        .verbose(false)
        .shuffle(false)
        .display_mode(DisplayMode::Plain)
}

#[test]
fn constant_loss_over_two_epochs() {
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1));
    let history = trainer
        .train(counting_dataset(10), None, &quiet(2).batch_size(5), vec![])
        .unwrap();

    assert_eq!(history.get("loss").unwrap(), &[1.0, 1.0]);
    assert_eq!(history.average().unwrap()["loss"], 1.0);
    assert_eq!(history.len(), 1);
    assert_eq!(trainer.state(), RunState::Completed);
    assert!(!trainer.is_training());
}

#[test]
fn epoch_value_is_the_mean_over_batches() {
    let mut trainer = Trainer::new(ProbeTask::target_mean(), Sgd::new(0.1));
    let history = trainer
        .train(counting_dataset(10), None, &quiet(1).batch_size(5), vec![])
        .unwrap();
    // Batch target means are 3 and 8.
    assert_relative_eq!(history.get("loss").unwrap()[0], 5.5);
}

#[test]
fn hooks_fire_in_order() {
    let (recorder, log) = Recorder::new();
    let mut trainer = Trainer::new(ProbeTask::target_mean(), Sgd::new(0.1));
    trainer
        .train(
            counting_batches(2),
            Some(counting_batches(1).into()),
            &quiet(1),
            vec![Box::new(recorder)],
        )
        .unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "train_begin",
            "epoch_begin:1",
            "train_batch_begin:0",
            "train_batch_end:0",
            "train_batch_begin:1",
            "train_batch_end:1",
            "validation_begin",
            "validation_batch_begin:0",
            "validation_batch_end:0",
            "validation_end",
            "epoch_end:1",
            "train_end",
        ]
    );
}

#[test]
fn stop_mid_epoch_keeps_partial_epoch_and_ends_once() {
    let (recorder, log) = Recorder::new();
    let mut trainer = Trainer::new(ProbeTask::target_mean(), Sgd::new(0.1));
    let history = trainer
        .train(
            counting_batches(5),
            None,
            &quiet(4),
            vec![Box::new(StopAt::new(2, 2)), Box::new(recorder)],
        )
        .unwrap();

    // Epoch 1 averages 1..=5, the stopped epoch 2 only its first three batches.
    assert_eq!(history.get("loss").unwrap(), &[3.0, 2.0]);

    let log = log.borrow();
    assert_eq!(log.iter().filter(|e| *e == "train_end").count(), 1);
    assert_eq!(log.iter().filter(|e| e.starts_with("train_batch_begin")).count(), 8);
    assert!(!log.iter().any(|e| e == "epoch_begin:3"));
    assert_eq!(log.last().map(String::as_str), Some("train_end"));
    assert_eq!(trainer.state(), RunState::Stopped);
    assert_eq!(trainer.control().stop_reason(), Some("requested by test"));
}

#[test]
fn stop_skips_validation_phase() {
    let (recorder, log) = Recorder::new();
    let mut trainer = Trainer::new(ProbeTask::target_mean(), Sgd::new(0.1));
    let history = trainer
        .train(
            counting_batches(3),
            Some(counting_batches(2).into()),
            &quiet(3),
            vec![Box::new(StopAt::new(1, 2)), Box::new(recorder)],
        )
        .unwrap();

    assert!(!history.contains_key("val_loss"));
    assert!(!log.borrow().iter().any(|e| e.starts_with("validation")));
}

#[test]
fn zero_epochs_still_begin_and_end() {
    let (recorder, log) = Recorder::new();
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1));
    let history = trainer
        .train(counting_dataset(4), None, &quiet(0), vec![Box::new(recorder)])
        .unwrap();

    assert!(history.is_empty());
    assert_eq!(*log.borrow(), vec!["train_begin", "train_end"]);
    assert_eq!(trainer.state(), RunState::Completed);
}

#[test]
fn validation_keys_are_prefixed() {
    let mut trainer = Trainer::new(ProbeTask::target_mean().with_metrics(), Sgd::new(0.1));
    let history = trainer
        .train(
            counting_batches(2),
            Some(Data::batched(counting_batches(4))),
            &quiet(2),
            vec![],
        )
        .unwrap();

    let keys: Vec<&str> = history.keys().collect();
    assert_eq!(keys, vec!["loss", "samples", "val_loss", "val_samples"]);
    assert_eq!(history.get("loss").unwrap(), &[1.5, 1.5]);
    assert_eq!(history.get("val_loss").unwrap(), &[2.5, 2.5]);
}

#[test]
fn no_validation_means_no_val_keys() {
    let mut trainer = Trainer::new(ProbeTask::target_mean().with_metrics(), Sgd::new(0.1));
    let history = trainer.train(counting_batches(2), None, &quiet(2), vec![]).unwrap();
    assert!(history.keys().all(|k| !k.starts_with("val_")));
}

#[test]
fn auto_picks_best_available_device() {
    struct SeesDevice(Rc<RefCell<Vec<Device>>>);

    impl Callback for SeesDevice {
        fn on_train_batch_begin(&mut self, ctx: &mut CallbackContext<'_>, _batch: usize) -> Result<()> {
            self.0.borrow_mut().push(ctx.model.device());
            self.0.borrow_mut().push(ctx.run.device);
            Ok(())
        }
    }

    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1))
        .with_probe(StaticProbe::new(vec![Device::Cpu, Device::Mps, Device::Cuda(0)]));
    trainer
        .train(counting_batches(1), None, &quiet(1), vec![Box::new(SeesDevice(Rc::clone(&seen)))])
        .unwrap();
    assert_eq!(*seen.borrow(), vec![Device::Cuda(0); 2]);
    assert_eq!(trainer.device(), Device::Cuda(0));
    assert_eq!(trainer.module().device(), Device::Cuda(0));
}

#[test]
fn missing_forced_device_fails() {
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1))
        .with_probe(StaticProbe::new(vec![Device::Cpu]));
    let err = trainer
        .train(counting_batches(1), None, &quiet(1).device("cuda:1"), vec![])
        .unwrap_err();
    assert!(matches!(err, TrainError::DeviceUnavailable { .. }));
    assert_eq!(trainer.state(), RunState::Idle);
}

#[test]
fn missing_device_falls_back_without_force() {
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1))
        .with_probe(StaticProbe::new(vec![Device::Cpu]));
    let history = trainer
        .train(
            counting_batches(1),
            None,
            &quiet(1).device("cuda:1").force_device(false),
            vec![],
        )
        .unwrap();
    assert_eq!(trainer.device(), Device::Cpu);
    assert_eq!(history.get("loss").unwrap().len(), 1);
}

#[test]
fn fallback_is_logged_as_a_warning() {
    let logs = SharedBuf::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1))
        .with_probe(StaticProbe::new(vec![Device::Cpu]));
    tracing::subscriber::with_default(subscriber, || {
        trainer
            .train(
                counting_batches(1),
                None,
                &quiet(1).device("cuda:1").force_device(false),
                vec![],
            )
            .unwrap();
    });

    let out = logs.contents();
    let line = out
        .lines()
        .find(|l| l.contains("Device cuda:1 not available, using cpu"))
        .unwrap_or_else(|| panic!("no fallback line in:\n{out}"));
    assert!(line.contains("WARN"));
}

fn sink_to(buf: &SharedBuf) -> impl Fn() -> Box<dyn Write> + 'static {
    let buf = buf.clone();
    move || -> Box<dyn Write> { Box::new(buf.clone()) }
}

#[test]
fn verbose_run_reports_each_epoch_once() {
    let builtin = SharedBuf::default();
    let user = SharedBuf::default();
    let mut trainer =
        Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1)).with_progress_sink(sink_to(&builtin));

    trainer
        .train(
            counting_batches(2),
            None,
            &quiet(2).verbose(true),
            vec![Box::new(ProgressCallback::with_sink(Box::new(user.clone())))],
        )
        .unwrap();

    assert_eq!(builtin.contents(), "Epoch 1/2 - loss: 1.0000\nEpoch 2/2 - loss: 1.0000\n");
    assert_eq!(user.contents(), "");
}

#[test]
fn quiet_run_prints_no_status_lines() {
    let builtin = SharedBuf::default();
    let mut trainer =
        Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1)).with_progress_sink(sink_to(&builtin));
    trainer.train(counting_batches(2), None, &quiet(2), vec![]).unwrap();
    assert_eq!(builtin.contents(), "");
}

#[test]
fn verbose_reporter_runs_before_user_callbacks() {
    struct SeesEpochLine {
        sink: SharedBuf,
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl Callback for SeesEpochLine {
        fn on_epoch_end(&mut self, _ctx: &mut CallbackContext<'_>, _epoch: usize, _logs: &Metrics) -> Result<()> {
            self.seen.borrow_mut().push(self.sink.contents());
            Ok(())
        }
    }

    let builtin = SharedBuf::default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut trainer =
        Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1)).with_progress_sink(sink_to(&builtin));
    trainer
        .train(
            counting_batches(1),
            None,
            &quiet(1).verbose(true),
            vec![Box::new(SeesEpochLine { sink: builtin.clone(), seen: Rc::clone(&seen) })],
        )
        .unwrap();
    assert_eq!(*seen.borrow(), vec!["Epoch 1/1 - loss: 1.0000\n".to_string()]);
}

#[test]
fn callback_error_aborts_the_run() {
    let (recorder, log) = Recorder::new();
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1));
    let err = trainer
        .train(
            counting_batches(2),
            None,
            &quiet(3),
            vec![Box::new(FailAt(2)), Box::new(recorder)],
        )
        .unwrap_err();

    assert!(matches!(err, TrainError::Callback { ref callback, .. } if callback == "FailAt"));
    assert_eq!(trainer.state(), RunState::Stopped);
    assert!(!log.borrow().iter().any(|e| e == "train_end"));
}

#[test]
fn default_predict_rejects_unpaired_batches() {
    let batches = Batches::new(vec![Batch::Tensor(Tensor::ones(2, 1))]);
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1));
    let err = trainer.train(batches, None, &quiet(1), vec![]).unwrap_err();
    assert!(matches!(err, TrainError::ContractViolation(_)));
}

#[test]
fn detached_loss_cannot_be_trained_on() {
    let mut task = ProbeTask::constant(1.0);
    task.detached = true;
    let mut trainer = Trainer::new(task, Sgd::new(0.1));
    let err = trainer.train(counting_batches(1), None, &quiet(1), vec![]).unwrap_err();
    assert!(matches!(err, TrainError::ContractViolation(_)));
}

#[test]
fn zero_batch_size_is_rejected() {
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1));
    let err = trainer
        .train(counting_dataset(3), None, &quiet(1).batch_size(0), vec![])
        .unwrap_err();
    assert!(matches!(err, TrainError::ContractViolation(_)));
}

#[test]
fn fit_without_task_data_is_a_contract_violation() {
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1));
    let err = trainer.fit(&quiet(1), vec![]).unwrap_err();
    assert!(matches!(err, TrainError::ContractViolation(_)));
}

#[test]
fn module_is_in_eval_mode_during_validation() {
    struct Modes(Rc<RefCell<Vec<(char, bool)>>>);

    impl Callback for Modes {
        fn on_train_batch_end(&mut self, ctx: &mut CallbackContext<'_>, _b: usize, _l: &Metrics) -> Result<()> {
            self.0.borrow_mut().push(('t', ctx.model.is_training()));
            Ok(())
        }

        fn on_validation_batch_end(&mut self, ctx: &mut CallbackContext<'_>, _b: usize, _l: &Metrics) -> Result<()> {
            self.0.borrow_mut().push(('v', ctx.model.is_training()));
            Ok(())
        }
    }

    let seen = Rc::default();
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1));
    trainer
        .train(
            counting_batches(1),
            Some(counting_batches(1).into()),
            &quiet(2),
            vec![Box::new(Modes(Rc::clone(&seen)))],
        )
        .unwrap();
    assert_eq!(*seen.borrow(), vec![('t', true), ('v', false), ('t', true), ('v', false)]);
}

#[test]
fn early_stopping_ends_a_plateau() {
    let mut trainer = Trainer::new(ProbeTask::constant(1.0), Sgd::new(0.1));
    let history = trainer
        .train(
            counting_batches(2),
            None,
            &quiet(10),
            vec![Box::new(EarlyStopping::new("loss", 2, 0.0))],
        )
        .unwrap();
    assert_eq!(history.get("loss").unwrap().len(), 3);
    assert_eq!(trainer.state(), RunState::Stopped);
}

struct Line {
    net: Sequential,
}

impl Task for Line {
    type Module = Sequential;

    fn module(&self) -> &Sequential {
        &self.net
    }

    fn module_mut(&mut self) -> &mut Sequential {
        &mut self.net
    }

    fn compute_loss(&mut self, batch: &Batch, output: &Tensor) -> Result<ferrite_train::Loss> {
        let (_, targets) = batch.input_target()?;
        Ok(MseLoss::loss(output, targets))
    }
}

#[test]
fn dense_model_learns_a_line() {
    let xs: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64 / 16.0 - 1.0]).collect();
    let ys = xs.iter().map(|x| vec![2.0 * x[0] + 1.0]).collect();
    let data = TensorDataset::from_rows(xs, ys);

    let task = Line { net: Sequential::dense(vec![(1, 1, Activation::Identity)]) };
    let mut trainer = Trainer::new(task, Sgd::new(0.1));
    let history = trainer
        .train(data, None, &quiet(60).batch_size(8).shuffle(true).seed(3), vec![])
        .unwrap();

    let losses = history.get("loss").unwrap();
    assert!(losses[losses.len() - 1] < losses[0]);
    assert!(losses[losses.len() - 1] < 1e-2);
}

struct Clusters {
    net: Sequential,
}

impl Task for Clusters {
    type Module = Sequential;

    fn module(&self) -> &Sequential {
        &self.net
    }

    fn module_mut(&mut self) -> &mut Sequential {
        &mut self.net
    }

    fn compute_loss(&mut self, batch: &Batch, output: &Tensor) -> Result<ferrite_train::Loss> {
        let (_, targets) = batch.input_target()?;
        Ok(CrossEntropyLoss::loss(output, targets))
    }

    fn eval_metrics(&mut self, batch: &Batch, output: &Tensor) -> Option<Metrics> {
        let (_, targets) = batch.input_target().ok()?;
        let hits = output
            .argmax_rows()
            .iter()
            .zip(targets.argmax_rows())
            .filter(|(p, t)| **p == *t)
            .count();
        Some(Metrics::from([("accuracy".to_string(), hits as f64 / output.rows as f64)]))
    }
}

fn clusters(n: usize, offset: f64) -> TensorDataset {
    let mut xs = Vec::with_capacity(2 * n);
    let mut ys = Vec::with_capacity(2 * n);
    for i in 0..n {
        let jitter = i as f64 / n as f64 - 0.5;
        xs.push(vec![-1.0 + 0.3 * jitter + offset, 1.0 - 0.3 * jitter]);
        ys.push(vec![1.0, 0.0]);
        xs.push(vec![1.0 - 0.3 * jitter, -1.0 + 0.3 * jitter + offset]);
        ys.push(vec![0.0, 1.0]);
    }
    TensorDataset::from_rows(xs, ys)
}

#[test]
fn softmax_classifier_separates_two_clusters() {
    let task = Clusters {
        net: Sequential::dense(vec![
            (2, 8, Activation::LeakyReLU { alpha: 0.01 }),
            (8, 2, Activation::Softmax),
        ]),
    };
    let mut trainer = Trainer::new(task, Sgd::new(0.1).with_momentum(0.9));
    let history = trainer
        .train(
            clusters(16, 0.0),
            Some(clusters(8, 0.05).into()),
            &quiet(40).batch_size(8).shuffle(true).seed(11),
            vec![],
        )
        .unwrap();

    let losses = history.get("loss").unwrap();
    assert!(losses[losses.len() - 1] < losses[0]);
    assert_eq!(history.last()["val_accuracy"], 1.0);
    assert!(history.get("accuracy").unwrap().iter().all(|a| (0.0..=1.0).contains(a)));
}

use std::io::Write;

use tracing::{debug, error, info, warn};

use crate::data::{load_on_device, Batch, BatchSource, Data};
use crate::device::{Device, DeviceProbe, DeviceRequest, DeviceResolver, HostProbe};
use crate::error::{Result, TrainError};
use crate::history::{History, Metrics};
use crate::nn::module::Module;
use crate::optim::Optimizer;
use crate::train::callback::{Callback, CallbackContext, CallbackList};
use crate::train::config::{RunConfig, TrainConfig};
use crate::train::control::{RunState, TrainControl};
use crate::train::progress::{DisplayDetector, EnvDisplayDetector, ProgressCallback};
use crate::train::running::RunningStatistics;
use crate::train::task::Task;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Train,
    Validation,
}

impl Phase {
    /// Metric key as recorded for this phase: validation keys get `val_`.
    fn key(self, name: &str) -> String {
        match self {
            Phase::Train => name.to_string(),
            Phase::Validation => format!("val_{name}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Drives the epoch/batch loop for a [`Task`].
///
/// Each epoch runs a training phase over every training batch (forward,
/// loss, backward, optimizer step) and, when validation data is given, a
/// validation phase with the module in evaluation mode. Per-batch metrics
/// are averaged per phase and one value per key per epoch lands in the
/// returned [`History`].
///
/// ```rust,no_run
/// # use ferrite_train::*;
/// # fn demo<T: Task>(task: T, data: TensorDataset) -> Result<()> {
/// let mut trainer = Trainer::new(task, Sgd::new(0.1));
/// let history = trainer.train(data, None, &TrainConfig::new(10), vec![])?;
/// println!("{}", history.to_json_string()?);
/// # Ok(())
/// # }
/// ```
pub struct Trainer<T: Task> {
    task: T,
    optimizer: Box<dyn Optimizer>,
    resolver: DeviceResolver<Box<dyn DeviceProbe>>,
    detector: Box<dyn DisplayDetector>,
    progress_sink: Box<dyn Fn() -> Box<dyn Write>>,
    control: TrainControl,
}

impl<T: Task> Trainer<T> {
    pub fn new(task: T, optimizer: impl Optimizer + 'static) -> Self {
        Trainer {
            task,
            optimizer: Box::new(optimizer),
            resolver: DeviceResolver::new(Box::new(HostProbe)),
            detector: Box::new(EnvDisplayDetector),
            progress_sink: Box::new(|| -> Box<dyn Write> { Box::new(std::io::stdout()) }),
            control: TrainControl::new(Device::Cpu, true),
        }
    }

    /// Replaces the hardware probe used to resolve `"auto"` and check
    /// explicit device requests.
    pub fn with_probe(mut self, probe: impl DeviceProbe + 'static) -> Self {
        self.resolver = DeviceResolver::new(Box::new(probe));
        self
    }

    /// Replaces the strategy that resolves `DisplayMode::Auto`.
    pub fn with_display_detector(mut self, detector: impl DisplayDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Where the built-in progress reporter writes its per-epoch lines;
    /// `sink` is called once per verbose run. Stdout by default.
    pub fn with_progress_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn() -> Box<dyn Write> + 'static,
    {
        self.progress_sink = Box::new(sink);
        self
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    pub fn into_task(self) -> T {
        self.task
    }

    pub fn module(&self) -> &T::Module {
        self.task.module()
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn optimizer_mut(&mut self) -> &mut dyn Optimizer {
        self.optimizer.as_mut()
    }

    pub fn control(&self) -> &TrainControl {
        &self.control
    }

    pub fn state(&self) -> RunState {
        self.control.state()
    }

    pub fn is_training(&self) -> bool {
        self.control.is_training()
    }

    /// Device of the most recent run (the CPU before any run).
    pub fn device(&self) -> Device {
        self.control.device()
    }

    /// Lets the task fetch and prepare its data.
    pub fn load_dataset(&mut self) -> Result<()> {
        self.task.load_dataset()
    }

    /// Trains on the data the task provides through `train_data` and
    /// `val_data`.
    ///
    /// # Errors
    /// `ContractViolation` if the task has no training data.
    pub fn fit(&mut self, config: &TrainConfig, callbacks: Vec<Box<dyn Callback>>) -> Result<History> {
        let train_data = self.task.train_data().ok_or_else(|| {
            TrainError::contract("Task::train_data returned no data; pass data to Trainer::train instead")
        })?;
        let val_data = self.task.val_data();
        self.train(train_data, val_data, config, callbacks)
    }

    /// Runs `config.num_epochs` epochs and returns the per-epoch history.
    ///
    /// Raw datasets are batched with `config.batch_size`, training data
    /// reshuffled on every pass when `config.shuffle` is set; already
    /// batched data is used as is. A run that a callback stops early still
    /// returns `Ok` with the epochs recorded so far.
    ///
    /// # Errors
    /// - `DeviceUnavailable` when an explicit device is missing and
    ///   `config.force_device` is set
    /// - `ContractViolation` from the task (bad batch shape, loss without
    ///   gradient) or a zero batch size
    /// - whatever a callback hook returned
    pub fn train(
        &mut self,
        train_data: impl Into<Data>,
        val_data: Option<Data>,
        config: &TrainConfig,
        callbacks: Vec<Box<dyn Callback>>,
    ) -> Result<History> {
        let request = DeviceRequest::from(config.device.as_str());
        let resolution = self.resolver.resolve(&request, config.force_device)?;
        let device = resolution.device;
        self.control = TrainControl::new(device, config.verbose);
        if resolution.fell_back {
            warn!("{}", resolution.summary());
        } else if config.verbose {
            info!("{}", resolution.summary());
        }
        self.task.module_mut().to_device(&device);

        let train_source = train_data
            .into()
            .into_source(config.batch_size, config.shuffle, config.seed)?;
        let val_source = val_data
            .map(|data| data.into_source(config.batch_size, false, None))
            .transpose()?;

        let display_mode = config.display_mode.resolve(self.detector.as_ref());
        let run = RunConfig {
            num_epochs: config.num_epochs,
            num_batches: train_source.num_batches(),
            num_val_batches: val_source.as_ref().map(|source| source.num_batches()),
            batch_size: config.batch_size,
            device,
            verbose: config.verbose,
            display_mode,
        };

        let reporter: Option<Box<dyn Callback>> = if config.verbose {
            info!("Running as a {}", display_mode.describe());
            Some(Box::new(ProgressCallback::with_sink((self.progress_sink)())))
        } else {
            None
        };
        let mut callbacks = CallbackList::setup(reporter, callbacks);

        let mut history = History::new();
        match self.training_loop(&mut callbacks, &run, &*train_source, val_source.as_deref(), &mut history) {
            Ok(()) => Ok(history),
            Err(err) => {
                self.control.abort();
                error!(error = %err, "training aborted");
                Err(err)
            }
        }
    }

    fn training_loop(
        &mut self,
        callbacks: &mut CallbackList,
        run: &RunConfig,
        train: &dyn BatchSource,
        val: Option<&dyn BatchSource>,
        history: &mut History,
    ) -> Result<()> {
        self.control.begin();
        self.dispatch(callbacks, run, |cb, ctx| cb.on_train_begin(ctx))?;

        for epoch in 1..=run.num_epochs {
            if !self.control.is_training() {
                break;
            }
            if !self.dispatch(callbacks, run, |cb, ctx| cb.on_epoch_begin(ctx, epoch))? {
                break;
            }

            let mut stats = self.run_phase(Phase::Train, callbacks, run, train)?;
            if let Some(val) = val {
                if self.control.is_training() {
                    stats.merge(self.run_phase(Phase::Validation, callbacks, run, val)?);
                }
            }
            let metrics = stats.average();

            history.update(metrics.clone());
            debug!(epoch, ?metrics, "epoch finished");
            self.control.record_epoch(metrics.clone());
            if !self.dispatch(callbacks, run, |cb, ctx| cb.on_epoch_end(ctx, epoch, &metrics))? {
                break;
            }
        }

        // Whatever ended the loop, callbacks see the run as over.
        let completed = self.control.is_training();
        self.control.stop();
        let last = self.control.last_epoch_metrics().clone();
        self.dispatch(callbacks, run, |cb, ctx| cb.on_train_end(ctx, &last))?;
        self.control.finish(completed);
        Ok(())
    }

    /// One pass over `source`; returns the phase statistics (empty if the
    /// phase saw no batch).
    fn run_phase(
        &mut self,
        phase: Phase,
        callbacks: &mut CallbackList,
        run: &RunConfig,
        source: &dyn BatchSource,
    ) -> Result<RunningStatistics> {
        debug!(?phase, "phase started");
        self.task.module_mut().set_training(phase == Phase::Train);
        if phase == Phase::Validation
            && !self.dispatch(callbacks, run, |cb, ctx| cb.on_validation_begin(ctx))?
        {
            self.dispatch(callbacks, run, |cb, ctx| cb.on_validation_end(ctx, &Metrics::new()))?;
            return Ok(RunningStatistics::new());
        }

        let mut stats = RunningStatistics::new();
        for (index, batch) in load_on_device(source.batches(), run.device).enumerate() {
            let batch = batch?;
            let continues = match phase {
                Phase::Train => self.dispatch(callbacks, run, |cb, ctx| cb.on_train_batch_begin(ctx, index))?,
                Phase::Validation => {
                    self.dispatch(callbacks, run, |cb, ctx| cb.on_validation_batch_begin(ctx, index))?
                }
            };
            if !continues {
                break;
            }

            stats.update(self.step(phase, &batch)?);

            let running = stats.average();
            let continues = match phase {
                Phase::Train => {
                    self.dispatch(callbacks, run, |cb, ctx| cb.on_train_batch_end(ctx, index, &running))?
                }
                Phase::Validation => {
                    self.dispatch(callbacks, run, |cb, ctx| cb.on_validation_batch_end(ctx, index, &running))?
                }
            };
            if !continues {
                break;
            }
        }

        if phase == Phase::Validation {
            let average = stats.average();
            self.dispatch(callbacks, run, |cb, ctx| cb.on_validation_end(ctx, &average))?;
        }
        debug!(?phase, batches = stats.num_updates(), "phase finished");
        Ok(stats)
    }

    /// Forward, loss and (in training) backward plus one optimizer step
    /// for a single batch. Returns the batch metrics keyed for `phase`.
    fn step(&mut self, phase: Phase, batch: &Batch) -> Result<Metrics> {
        let output = self.task.predict(batch)?;
        let loss = self.task.compute_loss(batch, &output)?;

        if phase == Phase::Train {
            let grad = loss.grad().ok_or_else(|| {
                TrainError::contract("compute_loss returned a loss without gradient during training")
            })?;
            self.task.module_mut().backward(grad)?;
            self.optimizer.step(self.task.module_mut());
            self.optimizer.zero_grad(self.task.module_mut());
        }

        let mut metrics = Metrics::new();
        if let Some(extra) = self.task.eval_metrics(batch, &output) {
            metrics.extend(extra.into_iter().map(|(key, value)| (phase.key(&key), value)));
        }
        metrics.insert(phase.key("loss"), loss.value());
        Ok(metrics)
    }

    /// Dispatches `hook` to every callback and reports whether the run may
    /// continue.
    fn dispatch<F>(&mut self, callbacks: &mut CallbackList, run: &RunConfig, hook: F) -> Result<bool>
    where
        F: FnMut(&mut dyn Callback, &mut CallbackContext<'_>) -> Result<()>,
    {
        callbacks.dispatch(self.task.module(), &mut self.control, run, hook)?;
        Ok(self.control.is_training())
    }
}

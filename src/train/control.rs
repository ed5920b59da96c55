use std::fmt;

use indicatif::ProgressBar;
use tracing::info;

use crate::device::Device;
use crate::history::Metrics;

/// Lifecycle of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run started yet.
    Idle,
    Running,
    /// A callback stopped the run (or it aborted on an error).
    Stopped,
    /// Every epoch ran.
    Completed,
}

/// Run state owned by the trainer.
///
/// Callbacks receive it mutably but can only read it and request a stop;
/// the stop is honoured at the next checkpoint, never mid-batch.
#[derive(Clone)]
pub struct TrainControl {
    is_training: bool,
    state: RunState,
    device: Device,
    verbose: bool,
    stop_reason: Option<String>,
    last_epoch_metrics: Metrics,
    // bar currently drawn by the progress reporter
    progress: Option<ProgressBar>,
}

impl fmt::Debug for TrainControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainControl")
            .field("is_training", &self.is_training)
            .field("state", &self.state)
            .field("device", &self.device)
            .field("verbose", &self.verbose)
            .field("stop_reason", &self.stop_reason)
            .field("last_epoch_metrics", &self.last_epoch_metrics)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Default for TrainControl {
    fn default() -> Self {
        TrainControl::new(Device::Cpu, true)
    }
}

impl TrainControl {
    pub(crate) fn new(device: Device, verbose: bool) -> Self {
        TrainControl {
            is_training: false,
            state: RunState::Idle,
            device,
            verbose,
            stop_reason: None,
            last_epoch_metrics: Metrics::new(),
            progress: None,
        }
    }

    /// Asks the trainer to stop at the next checkpoint.
    pub fn stop(&mut self) {
        self.is_training = false;
    }

    /// Like [`TrainControl::stop`], recording why.
    pub fn stop_with_reason(&mut self, reason: impl Into<String>) {
        self.stop_reason = Some(reason.into());
        self.stop();
    }

    pub fn is_training(&self) -> bool {
        self.is_training
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// Metrics passed to the most recent `epoch_end`.
    pub fn last_epoch_metrics(&self) -> &Metrics {
        &self.last_epoch_metrics
    }

    /// User-facing message from inside a callback; silent when the run is
    /// not verbose. While a progress bar is drawing, the line is printed
    /// above it so the bar is not torn.
    pub fn log(&self, message: impl AsRef<str>) {
        if !self.verbose {
            return;
        }
        match self.progress.as_ref().filter(|bar| !bar.is_hidden()) {
            Some(bar) => bar.println(message.as_ref()),
            None => info!("{}", message.as_ref()),
        }
    }

    /// Registers the bar a reporter is drawing, so that [`TrainControl::log`]
    /// can print around it.
    pub fn attach_progress(&mut self, bar: ProgressBar) {
        self.progress = Some(bar);
    }

    pub fn detach_progress(&mut self) {
        self.progress = None;
    }

    pub fn progress(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }

    pub(crate) fn begin(&mut self) {
        self.is_training = true;
        self.state = RunState::Running;
        self.stop_reason = None;
        self.last_epoch_metrics.clear();
        self.progress = None;
    }

    pub(crate) fn record_epoch(&mut self, metrics: Metrics) {
        self.last_epoch_metrics = metrics;
    }

    /// Leaves `Running` for `Completed` or `Stopped`. The stop flag is down
    /// afterwards either way.
    pub(crate) fn finish(&mut self, completed: bool) {
        self.state = if completed { RunState::Completed } else { RunState::Stopped };
        self.is_training = false;
    }

    pub(crate) fn abort(&mut self) {
        self.is_training = false;
        self.state = RunState::Stopped;
    }
}

use tracing::warn;

use crate::error::Result;
use crate::history::Metrics;
use crate::train::callback::{Callback, CallbackContext};

/// Whether the monitored metric should go down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Min,
    Max,
}

/// Stops training when a monitored epoch metric stops improving.
///
/// ```rust
/// use ferrite_train::EarlyStopping;
///
/// // Stop once val_loss has not improved by at least 0.001 for 5 epochs.
/// let early_stop = EarlyStopping::new("val_loss", 5, 0.001);
/// ```
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    monitor: String,
    patience: usize,
    min_delta: f64,
    mode: MonitorMode,
    best: Option<f64>,
    epochs_without_improvement: usize,
    stopped_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(monitor: impl Into<String>, patience: usize, min_delta: f64) -> Self {
        EarlyStopping {
            monitor: monitor.into(),
            patience,
            min_delta,
            mode: MonitorMode::Min,
            best: None,
            epochs_without_improvement: 0,
            stopped_epoch: None,
        }
    }

    /// Treat larger values as better (accuracy-like metrics).
    pub fn maximize(mut self) -> Self {
        self.mode = MonitorMode::Max;
        self
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }

    fn improved(&self, value: f64) -> bool {
        match (self.best, self.mode) {
            (None, _) => true,
            (Some(best), MonitorMode::Min) => value < best - self.min_delta,
            (Some(best), MonitorMode::Max) => value > best + self.min_delta,
        }
    }
}

impl Callback for EarlyStopping {
    fn on_train_begin(&mut self, _ctx: &mut CallbackContext<'_>) -> Result<()> {
        self.best = None;
        self.epochs_without_improvement = 0;
        self.stopped_epoch = None;
        Ok(())
    }

    fn on_epoch_end(
        &mut self,
        ctx: &mut CallbackContext<'_>,
        epoch: usize,
        logs: &Metrics,
    ) -> Result<()> {
        let Some(&value) = logs.get(&self.monitor) else {
            warn!(monitor = %self.monitor, "early stopping metric missing from epoch logs");
            return Ok(());
        };

        if self.improved(value) {
            self.best = Some(value);
            self.epochs_without_improvement = 0;
            return Ok(());
        }

        self.epochs_without_improvement += 1;
        if self.epochs_without_improvement >= self.patience {
            self.stopped_epoch = Some(epoch);
            let reason = format!(
                "no improvement in {} for {} epochs (best: {:.4})",
                self.monitor,
                self.patience,
                self.best.unwrap_or(value)
            );
            if ctx.run.verbose {
                warn!("Early stopping at epoch {epoch}: {reason}");
            }
            ctx.control.stop_with_reason(reason);
        }
        Ok(())
    }
}

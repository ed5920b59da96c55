use std::io::{IsTerminal, Write};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::history::Metrics;
use crate::train::callback::{Callback, CallbackContext};

// ---------------------------------------------------------------------------
// Display mode
// ---------------------------------------------------------------------------

/// How the progress reporter renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Decide once per run through a [`DisplayDetector`].
    #[default]
    Auto,
    /// Redrawing progress bars on stderr plus one line per epoch.
    Plain,
    /// Only the per-epoch lines; notebook frontends garble redraws.
    Notebook,
}

impl DisplayMode {
    /// Replaces `Auto` with whatever `detector` reports.
    pub fn resolve(self, detector: &dyn DisplayDetector) -> DisplayMode {
        match self {
            DisplayMode::Auto => match detector.detect() {
                DisplayMode::Auto => DisplayMode::Plain,
                detected => detected,
            },
            explicit => explicit,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DisplayMode::Notebook => "notebook",
            _ => "script",
        }
    }
}

/// Strategy for deciding the display mode when the user did not.
pub trait DisplayDetector {
    fn detect(&self) -> DisplayMode;
}

/// Looks for the environment markers Jupyter kernels and Colab set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvDisplayDetector;

const NOTEBOOK_MARKERS: &[&str] = &["JPY_PARENT_PID", "COLAB_RELEASE_TAG", "COLAB_GPU"];

impl DisplayDetector for EnvDisplayDetector {
    fn detect(&self) -> DisplayMode {
        if NOTEBOOK_MARKERS.iter().any(|var| std::env::var_os(var).is_some()) {
            DisplayMode::Notebook
        } else {
            DisplayMode::Plain
        }
    }
}

/// Always reports the same mode.
#[derive(Debug, Clone, Copy)]
pub struct FixedDisplay(pub DisplayMode);

impl DisplayDetector for FixedDisplay {
    fn detect(&self) -> DisplayMode {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Progress reporter
// ---------------------------------------------------------------------------

/// Built-in progress reporter, registered first whenever a run is verbose.
///
/// In `Plain` mode a bar tracks the batches of each phase; in both modes
/// one status line per epoch goes to the sink (stdout by default).
pub struct ProgressCallback {
    bar: Option<ProgressBar>,
    sink: Box<dyn Write>,
}

impl Default for ProgressCallback {
    fn default() -> Self {
        ProgressCallback::new()
    }
}

impl ProgressCallback {
    pub fn new() -> Self {
        ProgressCallback::with_sink(Box::new(std::io::stdout()))
    }

    /// Writes the per-epoch lines to `sink` instead of stdout.
    pub fn with_sink(sink: Box<dyn Write>) -> Self {
        ProgressCallback { bar: None, sink }
    }

    fn start_bar(&mut self, ctx: &mut CallbackContext<'_>, len: usize, prefix: String) {
        self.finish_bar(ctx);
        let draws = ctx.run.display_mode == DisplayMode::Plain && std::io::stderr().is_terminal();
        let bar = if draws {
            ProgressBar::with_draw_target(Some(len as u64), ProgressDrawTarget::stderr())
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::default_bar().template("{prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_prefix(prefix);
        ctx.control.attach_progress(bar.clone());
        self.bar = Some(bar);
    }

    fn advance(&mut self, logs: &Metrics) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
            bar.set_message(format_metrics(logs));
        }
    }

    fn finish_bar(&mut self, ctx: &mut CallbackContext<'_>) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
            ctx.control.detach_progress();
        }
    }
}

impl Callback for ProgressCallback {
    fn on_epoch_begin(&mut self, ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        let prefix = format!("Epoch {epoch}/{}", ctx.run.num_epochs);
        let len = ctx.run.num_batches;
        self.start_bar(ctx, len, prefix);
        Ok(())
    }

    fn on_train_batch_end(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        _batch: usize,
        logs: &Metrics,
    ) -> Result<()> {
        self.advance(logs);
        Ok(())
    }

    fn on_validation_begin(&mut self, ctx: &mut CallbackContext<'_>) -> Result<()> {
        let len = ctx.run.num_val_batches.unwrap_or(0);
        self.start_bar(ctx, len, "Validation".to_string());
        Ok(())
    }

    fn on_validation_batch_end(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        _batch: usize,
        logs: &Metrics,
    ) -> Result<()> {
        self.advance(logs);
        Ok(())
    }

    fn on_epoch_end(
        &mut self,
        ctx: &mut CallbackContext<'_>,
        epoch: usize,
        logs: &Metrics,
    ) -> Result<()> {
        self.finish_bar(ctx);
        writeln!(self.sink, "{}", format_status(epoch, ctx.run.num_epochs, logs))?;
        Ok(())
    }

    fn on_train_end(&mut self, ctx: &mut CallbackContext<'_>, _logs: &Metrics) -> Result<()> {
        self.finish_bar(ctx);
        self.sink.flush()?;
        Ok(())
    }
}

/// `loss: 0.1234 - val_loss: 0.2345`, keys in order.
pub fn format_metrics(metrics: &Metrics) -> String {
    metrics
        .iter()
        .map(|(k, v)| format!("{k}: {v:.4}"))
        .collect::<Vec<_>>()
        .join(" - ")
}

/// The status line printed at the end of every epoch.
pub fn format_status(epoch: usize, num_epochs: usize, metrics: &Metrics) -> String {
    if metrics.is_empty() {
        format!("Epoch {epoch}/{num_epochs}")
    } else {
        format!("Epoch {epoch}/{num_epochs} - {}", format_metrics(metrics))
    }
}

//! Callback system for training events.
//!
//! Hooks fire in this order for every run:
//!
//! ```text
//! train_begin
//!   epoch_begin(e)                       e = 1..=num_epochs
//!     train_batch_begin(b) / train_batch_end(b, running)
//!     validation_begin                    only with validation data
//!       validation_batch_begin(b) / validation_batch_end(b, running)
//!     validation_end(running)
//!   epoch_end(e, epoch_metrics)
//! train_end(last_epoch_metrics)
//! ```
//!
//! Batch numbers are 0-based, epoch numbers 1-based. The trainer checks the
//! stop flag right after every dispatch.
//!
//! # Example
//!
//! ```rust
//! use ferrite_train::{Callback, CallbackContext, Metrics, Result};
//!
//! struct StopOnNan;
//!
//! impl Callback for StopOnNan {
//!     fn on_train_batch_end(
//!         &mut self,
//!         ctx: &mut CallbackContext<'_>,
//!         _batch: usize,
//!         logs: &Metrics,
//!     ) -> Result<()> {
//!         if logs.get("loss").map_or(false, |l| l.is_nan()) {
//!             ctx.control.stop_with_reason("loss is NaN");
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use tracing::debug;

use crate::error::Result;
use crate::history::Metrics;
use crate::nn::module::Module;
use crate::train::config::RunConfig;
use crate::train::control::TrainControl;

/// What every hook gets to see.
pub struct CallbackContext<'a> {
    /// The model being trained. Inspect it, do not modify it.
    pub model: &'a dyn Module,
    pub control: &'a mut TrainControl,
    pub run: &'a RunConfig,
}

/// Observer of the training loop.
///
/// Every hook defaults to a no-op. An error returned from a hook aborts the
/// run and reaches the caller of `Trainer::train` unchanged.
pub trait Callback {
    fn on_train_begin(&mut self, _ctx: &mut CallbackContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_train_end(&mut self, _ctx: &mut CallbackContext<'_>, _logs: &Metrics) -> Result<()> {
        Ok(())
    }

    fn on_epoch_begin(&mut self, _ctx: &mut CallbackContext<'_>, _epoch: usize) -> Result<()> {
        Ok(())
    }

    fn on_epoch_end(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        _epoch: usize,
        _logs: &Metrics,
    ) -> Result<()> {
        Ok(())
    }

    fn on_train_batch_begin(&mut self, _ctx: &mut CallbackContext<'_>, _batch: usize) -> Result<()> {
        Ok(())
    }

    fn on_train_batch_end(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        _batch: usize,
        _logs: &Metrics,
    ) -> Result<()> {
        Ok(())
    }

    fn on_validation_begin(&mut self, _ctx: &mut CallbackContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_validation_end(&mut self, _ctx: &mut CallbackContext<'_>, _logs: &Metrics) -> Result<()> {
        Ok(())
    }

    fn on_validation_batch_begin(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        _batch: usize,
    ) -> Result<()> {
        Ok(())
    }

    fn on_validation_batch_end(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        _batch: usize,
        _logs: &Metrics,
    ) -> Result<()> {
        Ok(())
    }

    /// Identifies the kind of callback. Registration keeps at most one
    /// callback of the built-in progress reporter's kind.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Ordered callbacks, invoked synchronously in registration order.
#[derive(Default)]
pub struct CallbackList {
    callbacks: Vec<Box<dyn Callback>>,
}

impl CallbackList {
    pub fn new() -> Self {
        CallbackList::default()
    }

    /// Builds the list for a run: the built-in `reporter` first (if any),
    /// then the user's callbacks in order, minus any of the reporter's kind.
    pub fn setup(reporter: Option<Box<dyn Callback>>, user: Vec<Box<dyn Callback>>) -> Self {
        let mut list = CallbackList::new();
        let reporter_kind = reporter.as_ref().map(|r| r.kind());
        if let Some(reporter) = reporter {
            list.push(reporter);
        }
        for callback in user {
            if Some(callback.kind()) == reporter_kind {
                debug!(kind = callback.kind(), "skipping duplicate progress reporter");
                continue;
            }
            list.push(callback);
        }
        list
    }

    pub fn push(&mut self, callback: Box<dyn Callback>) {
        self.callbacks.push(callback);
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.callbacks.iter().map(|c| c.kind()).collect()
    }

    /// Runs `hook` on every callback in order, stopping at the first error.
    /// Stop requests are not checked here.
    pub fn dispatch<F>(
        &mut self,
        model: &dyn Module,
        control: &mut TrainControl,
        run: &RunConfig,
        mut hook: F,
    ) -> Result<()>
    where
        F: FnMut(&mut dyn Callback, &mut CallbackContext<'_>) -> Result<()>,
    {
        for callback in &mut self.callbacks {
            let mut ctx = CallbackContext { model, control: &mut *control, run };
            hook(callback.as_mut(), &mut ctx)?;
        }
        Ok(())
    }
}

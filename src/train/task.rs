use crate::data::{Batch, Data};
use crate::error::{Result, TrainError};
use crate::history::Metrics;
use crate::loss::Loss;
use crate::nn::module::Module;
use crate::tensor::Tensor;

/// A training problem: a module plus how to get predictions, a loss, and
/// metrics out of one batch.
///
/// Only `module`, `module_mut` and `compute_loss` are required.
///
/// ```rust
/// use ferrite_train::{Batch, Loss, MseLoss, Result, Sequential, Activation, Task, Tensor};
///
/// struct Regression {
///     net: Sequential,
/// }
///
/// impl Task for Regression {
///     type Module = Sequential;
///
///     fn module(&self) -> &Sequential { &self.net }
///     fn module_mut(&mut self) -> &mut Sequential { &mut self.net }
///
///     fn compute_loss(&mut self, batch: &Batch, output: &Tensor) -> Result<Loss> {
///         let (_, targets) = batch.input_target()?;
///         Ok(MseLoss::loss(output, targets))
///     }
/// }
///
/// let task = Regression { net: Sequential::dense(vec![(1, 1, Activation::Identity)]) };
/// # let _ = task;
/// ```
pub trait Task {
    type Module: Module;

    fn module(&self) -> &Self::Module;

    fn module_mut(&mut self) -> &mut Self::Module;

    /// Model output for `batch`.
    ///
    /// The default expects an `(inputs, targets)` pair with a tensor in first
    /// position and runs the module on it. Any other batch shape is a
    /// `ContractViolation`; override this method for such data.
    fn predict(&mut self, batch: &Batch) -> Result<Tensor> {
        match batch.as_seq() {
            Some([Batch::Tensor(inputs), _]) => self.module_mut().forward(inputs),
            _ => Err(TrainError::contract(format!(
                "default predict expects an (inputs, targets) batch, got {}; \
                 implement Task::predict for this data",
                batch.describe()
            ))),
        }
    }

    /// Loss of `output` on `batch`. In the training phase the returned loss
    /// must carry a gradient.
    fn compute_loss(&mut self, batch: &Batch, output: &Tensor) -> Result<Loss>;

    /// Extra per-batch metrics. Returned keys are recorded as is during
    /// training and with a `val_` prefix during validation.
    fn eval_metrics(&mut self, _batch: &Batch, _output: &Tensor) -> Option<Metrics> {
        None
    }

    /// Downloads, splits and preprocesses data, storing it on `self`.
    fn load_dataset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Training data used by `Trainer::fit`.
    fn train_data(&mut self) -> Option<Data> {
        None
    }

    /// Validation data used by `Trainer::fit`.
    fn val_data(&mut self) -> Option<Data> {
        None
    }
}

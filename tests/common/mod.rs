#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use ferrite_train::{
    Batch, Batches, Callback, CallbackContext, Identity, Loss, Metrics, Result, Task, Tensor,
    TensorDataset, TrainError,
};

/// Identity model whose loss is the mean of the batch targets (or a fixed
/// value), so expected averages can be computed by hand.
pub struct ProbeTask {
    pub module: Identity,
    pub constant: Option<f64>,
    pub metrics: bool,
    pub detached: bool,
}

impl ProbeTask {
    pub fn constant(value: f64) -> Self {
        ProbeTask { module: Identity::new(), constant: Some(value), metrics: false, detached: false }
    }

    pub fn target_mean() -> Self {
        ProbeTask { module: Identity::new(), constant: None, metrics: false, detached: false }
    }

    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }
}

impl Task for ProbeTask {
    type Module = Identity;

    fn module(&self) -> &Identity {
        &self.module
    }

    fn module_mut(&mut self) -> &mut Identity {
        &mut self.module
    }

    fn compute_loss(&mut self, batch: &Batch, output: &Tensor) -> Result<Loss> {
        let value = match self.constant {
            Some(value) => value,
            None => batch.input_target()?.1.mean(),
        };
        if self.detached {
            Ok(Loss::detached(value))
        } else {
            Ok(Loss::constant(value, output))
        }
    }

    fn eval_metrics(&mut self, batch: &Batch, _output: &Tensor) -> Option<Metrics> {
        if !self.metrics {
            return None;
        }
        let rows = batch.num_samples()? as f64;
        Some(Metrics::from([("samples".to_string(), rows)]))
    }
}

/// `n` samples with input `i` and target `i + 1`.
pub fn counting_dataset(n: usize) -> TensorDataset {
    let inputs = (0..n).map(|i| vec![i as f64]).collect();
    let targets = (0..n).map(|i| vec![(i + 1) as f64]).collect();
    TensorDataset::from_rows(inputs, targets)
}

/// `n` single-sample batches whose targets are 1, 2, ..., n.
pub fn counting_batches(n: usize) -> Batches {
    Batches::new(
        (0..n)
            .map(|i| Batch::pair(Tensor::full(1, 1, i as f64), Tensor::full(1, 1, (i + 1) as f64)))
            .collect(),
    )
}

pub type EventLog = Rc<RefCell<Vec<String>>>;

/// Records every hook invocation as a short string.
pub struct Recorder {
    pub log: EventLog,
}

impl Recorder {
    pub fn new() -> (Self, EventLog) {
        let log: EventLog = Rc::default();
        (Recorder { log: log.clone() }, log)
    }

    fn push(&self, event: String) {
        self.log.borrow_mut().push(event);
    }
}

impl Callback for Recorder {
    fn on_train_begin(&mut self, _ctx: &mut CallbackContext<'_>) -> Result<()> {
        self.push("train_begin".into());
        Ok(())
    }

    fn on_train_end(&mut self, _ctx: &mut CallbackContext<'_>, _logs: &Metrics) -> Result<()> {
        self.push("train_end".into());
        Ok(())
    }

    fn on_epoch_begin(&mut self, _ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        self.push(format!("epoch_begin:{epoch}"));
        Ok(())
    }

    fn on_epoch_end(&mut self, _ctx: &mut CallbackContext<'_>, epoch: usize, _logs: &Metrics) -> Result<()> {
        self.push(format!("epoch_end:{epoch}"));
        Ok(())
    }

    fn on_train_batch_begin(&mut self, _ctx: &mut CallbackContext<'_>, batch: usize) -> Result<()> {
        self.push(format!("train_batch_begin:{batch}"));
        Ok(())
    }

    fn on_train_batch_end(&mut self, _ctx: &mut CallbackContext<'_>, batch: usize, _logs: &Metrics) -> Result<()> {
        self.push(format!("train_batch_end:{batch}"));
        Ok(())
    }

    fn on_validation_begin(&mut self, _ctx: &mut CallbackContext<'_>) -> Result<()> {
        self.push("validation_begin".into());
        Ok(())
    }

    fn on_validation_end(&mut self, _ctx: &mut CallbackContext<'_>, _logs: &Metrics) -> Result<()> {
        self.push("validation_end".into());
        Ok(())
    }

    fn on_validation_batch_begin(&mut self, _ctx: &mut CallbackContext<'_>, batch: usize) -> Result<()> {
        self.push(format!("validation_batch_begin:{batch}"));
        Ok(())
    }

    fn on_validation_batch_end(
        &mut self,
        _ctx: &mut CallbackContext<'_>,
        batch: usize,
        _logs: &Metrics,
    ) -> Result<()> {
        self.push(format!("validation_batch_end:{batch}"));
        Ok(())
    }
}

/// Requests a stop at `train_batch_end` of the given epoch and batch.
pub struct StopAt {
    pub epoch: usize,
    pub batch: usize,
    current_epoch: usize,
}

impl StopAt {
    pub fn new(epoch: usize, batch: usize) -> Self {
        StopAt { epoch, batch, current_epoch: 0 }
    }
}

impl Callback for StopAt {
    fn on_epoch_begin(&mut self, _ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        self.current_epoch = epoch;
        Ok(())
    }

    fn on_train_batch_end(&mut self, ctx: &mut CallbackContext<'_>, batch: usize, _logs: &Metrics) -> Result<()> {
        if self.current_epoch == self.epoch && batch == self.batch {
            ctx.control.stop_with_reason("requested by test");
        }
        Ok(())
    }
}

/// Fails on the given epoch's `epoch_begin`.
pub struct FailAt(pub usize);

impl Callback for FailAt {
    fn on_epoch_begin(&mut self, _ctx: &mut CallbackContext<'_>, epoch: usize) -> Result<()> {
        if epoch == self.0 {
            return Err(TrainError::callback("FailAt", format!("refusing epoch {epoch}")));
        }
        Ok(())
    }
}

/// Clonable in-memory writer, usable both as a progress sink and as a
/// `tracing_subscriber` writer.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

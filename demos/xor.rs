use ferrite_train::{
    Activation, Batch, Callback, CallbackContext, Loss, Metrics, Module, MseLoss, Result,
    Sequential, Sgd, Task, Tensor, TensorDataset, TrainConfig, Trainer,
};
use tracing_subscriber::EnvFilter;

struct Xor {
    net: Sequential,
}

impl Task for Xor {
    type Module = Sequential;

    fn module(&self) -> &Sequential {
        &self.net
    }

    fn module_mut(&mut self) -> &mut Sequential {
        &mut self.net
    }

    fn compute_loss(&mut self, batch: &Batch, output: &Tensor) -> Result<Loss> {
        let (_, targets) = batch.input_target()?;
        Ok(MseLoss::loss(output, targets))
    }
}

/// Prints the loss every 1000 epochs.
struct EveryThousand;

impl Callback for EveryThousand {
    fn on_epoch_end(&mut self, _ctx: &mut CallbackContext<'_>, epoch: usize, logs: &Metrics) -> Result<()> {
        if epoch % 1000 == 0 {
            println!("Epoch {epoch}: loss = {:.6}", logs["loss"]);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let inputs = vec![
        vec![1.0, 0.0],
        vec![1.0, 1.0],
        vec![0.0, 1.0],
        vec![0.0, 0.0],
    ];
    let expected_outputs = vec![
        vec![1.0],
        vec![0.0],
        vec![1.0],
        vec![0.0],
    ];

    let task = Xor {
        net: Sequential::dense(vec![
            (2, 2, Activation::Sigmoid),
            (2, 1, Activation::Sigmoid),
        ]),
    };
    let mut trainer = Trainer::new(task, Sgd::new(0.1));
    let config = TrainConfig::new(10000).batch_size(1).shuffle(false).verbose(false);
    let history = trainer.train(
        TensorDataset::from_rows(inputs.clone(), expected_outputs),
        None,
        &config,
        vec![Box::new(EveryThousand)],
    )?;
    println!("final loss: {:.6}", history.last()["loss"]);

    let mut task = trainer.into_task();
    task.net.set_training(false);
    for input in &inputs {
        let out = task.net.forward(&Tensor::from_rows(vec![input.clone()]))?;
        println!("Input: {:?} -> Output: {:.4}", input, out.get(0, 0));
    }
    Ok(())
}

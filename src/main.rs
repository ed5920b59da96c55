// Trains a small XOR network through the full trainer and prints the
// resulting history as JSON. More demos:
//   cargo run --example xor
//   cargo run --example early_stopping
use ferrite_train::{
    Activation, Batch, BceLoss, Loss, Result, Sequential, Sgd, Task, Tensor, TensorDataset,
    TrainConfig, Trainer,
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
        Ok(BceLoss::loss(output, targets))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let data = TensorDataset::from_rows(
        vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
    );
    let task = Xor {
        net: Sequential::dense(vec![(2, 4, Activation::Tanh), (4, 1, Activation::Sigmoid)]),
    };
    let mut trainer = Trainer::new(task, Sgd::new(0.3).with_momentum(0.9));

    let config = TrainConfig::new(500).batch_size(4).verbose(false).seed(7);
    let history = trainer.train(data, None, &config, vec![])?;

    println!("{}", history.to_json_string()?);
    Ok(())
}

//! Fits a noisy line with a validation split and stops once `val_loss`
//! plateaus.
use ferrite_train::{
    Activation, Batch, Data, EarlyStopping, Loss, Metrics, MseLoss, Result, Sequential, Sgd, Task,
    Tensor, TensorDataset, TrainConfig, Trainer,
};
use rand::Rng;
use tracing_subscriber::EnvFilter;

struct LineFit {
    net: Sequential,
    train: Option<TensorDataset>,
    val: Option<TensorDataset>,
}

fn noisy_line(n: usize, rng: &mut impl Rng) -> TensorDataset {
    let xs: Vec<Vec<f64>> = (0..n).map(|_| vec![rng.gen_range(-1.0..1.0)]).collect();
    let ys = xs.iter().map(|x| vec![3.0 * x[0] - 0.5 + rng.gen_range(-0.05..0.05)]).collect();
    TensorDataset::from_rows(xs, ys)
}

impl Task for LineFit {
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

    fn eval_metrics(&mut self, batch: &Batch, output: &Tensor) -> Option<Metrics> {
        let (_, targets) = batch.input_target().ok()?;
        let mae = (output - targets).map(f64::abs).mean();
        Some(Metrics::from([("mae".to_string(), mae)]))
    }

    fn load_dataset(&mut self) -> Result<()> {
        let mut rng = rand::thread_rng();
        self.train = Some(noisy_line(256, &mut rng));
        self.val = Some(noisy_line(64, &mut rng));
        Ok(())
    }

    fn train_data(&mut self) -> Option<Data> {
        self.train.take().map(Data::dataset)
    }

    fn val_data(&mut self) -> Option<Data> {
        self.val.take().map(Data::dataset)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let task = LineFit {
        net: Sequential::dense(vec![(1, 1, Activation::Identity)]),
        train: None,
        val: None,
    };
    let mut trainer = Trainer::new(task, Sgd::new(0.05));
    trainer.load_dataset()?;

    let config = TrainConfig::new(200).batch_size(32);
    let history = trainer.fit(&config, vec![Box::new(EarlyStopping::new("val_loss", 5, 1e-5))])?;

    println!(
        "ran {} epochs ({:?}), best val_loss {:.5}",
        history.get("loss")?.len(),
        trainer.state(),
        history.get("val_loss")?.iter().cloned().fold(f64::INFINITY, f64::min)
    );
    if let Some(reason) = trainer.control().stop_reason() {
        println!("stopped: {reason}");
    }
    history.save_json("early_stopping_history")?;
    Ok(())
}

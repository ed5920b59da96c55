pub mod batch;
pub mod dataset;
pub mod loader;
pub mod pipeline;

pub use batch::Batch;
pub use dataset::{Dataset, TensorDataset};
pub use loader::{BatchSource, Batches, DataLoader};
pub use pipeline::{load_on_device, OnDevice, ToDevice};

use crate::error::Result;

/// Training or validation data as handed to the trainer.
pub enum Data {
    /// Raw samples; the trainer batches them with the configured
    /// `batch_size` and `shuffle`.
    Dataset(Box<dyn Dataset>),
    /// Already batched; `batch_size` and `shuffle` are ignored.
    Batched(Box<dyn BatchSource>),
}

impl Data {
    pub fn dataset(dataset: impl Dataset + 'static) -> Data {
        Data::Dataset(Box::new(dataset))
    }

    pub fn batched(source: impl BatchSource + 'static) -> Data {
        Data::Batched(Box::new(source))
    }

    /// Number of batches a pass yields, or `None` for raw datasets until
    /// they are batched.
    pub fn num_batches(&self) -> Option<usize> {
        match self {
            Data::Dataset(_) => None,
            Data::Batched(source) => Some(source.num_batches()),
        }
    }

    pub(crate) fn into_source(
        self,
        batch_size: usize,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Result<Box<dyn BatchSource>> {
        match self {
            Data::Dataset(dataset) => {
                let loader = DataLoader::new(dataset, batch_size, shuffle)?;
                Ok(match seed {
                    Some(seed) => Box::new(loader.with_seed(seed)),
                    None => Box::new(loader),
                })
            }
            Data::Batched(source) => Ok(source),
        }
    }
}

impl From<TensorDataset> for Data {
    fn from(dataset: TensorDataset) -> Self {
        Data::dataset(dataset)
    }
}

impl From<Batches> for Data {
    fn from(batches: Batches) -> Self {
        Data::batched(batches)
    }
}

impl<D: Dataset + 'static> From<DataLoader<D>> for Data {
    fn from(loader: DataLoader<D>) -> Self {
        Data::batched(loader)
    }
}

use std::cell::Cell;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::batch::Batch;
use crate::data::dataset::Dataset;
use crate::error::{Result, TrainError};

/// Something the loop can draw batches from, once per phase.
///
/// `batches` must return a fresh pass every time it is called; the engine
/// calls it at the start of every training and validation phase.
pub trait BatchSource {
    fn batches(&self) -> Box<dyn Iterator<Item = Result<Batch>> + '_>;

    fn num_batches(&self) -> usize;
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
    fn batches(&self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        (**self).batches()
    }

    fn num_batches(&self) -> usize {
        (**self).num_batches()
    }
}

/// Already-batched data, replayed as is on every pass.
#[derive(Debug, Clone, Default)]
pub struct Batches {
    batches: Vec<Batch>,
}

impl Batches {
    pub fn new(batches: Vec<Batch>) -> Batches {
        Batches { batches }
    }
}

impl BatchSource for Batches {
    fn batches(&self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        Box::new(self.batches.iter().cloned().map(Ok))
    }

    fn num_batches(&self) -> usize {
        self.batches.len()
    }
}

/// Groups dataset samples into batches of `batch_size`, optionally in a new
/// random order on every pass. The last batch may be short.
pub struct DataLoader<D> {
    dataset: D,
    batch_size: usize,
    shuffle: bool,
    seed: Option<u64>,
    passes: Cell<u64>,
}

impl<D: Dataset> DataLoader<D> {
    /// # Errors
    /// `ContractViolation` if `batch_size` is zero.
    pub fn new(dataset: D, batch_size: usize, shuffle: bool) -> Result<DataLoader<D>> {
        if batch_size == 0 {
            return Err(TrainError::contract("batch_size must be at least 1"));
        }
        Ok(DataLoader {
            dataset,
            batch_size,
            shuffle,
            seed: None,
            passes: Cell::new(0),
        })
    }

    /// Makes shuffling reproducible: pass `n` uses `seed + n`.
    pub fn with_seed(mut self, seed: u64) -> DataLoader<D> {
        self.seed = Some(seed);
        self
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn order(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let pass = self.passes.get();
            self.passes.set(pass + 1);
            match self.seed {
                Some(seed) => indices.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(pass))),
                None => indices.shuffle(&mut rand::thread_rng()),
            }
        }
        indices
    }
}

impl<D: Dataset> BatchSource for DataLoader<D> {
    fn batches(&self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        let order = self.order();
        let batch_size = self.batch_size;
        let n = order.len();
        Box::new((0..n).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(n);
            let samples = order[start..end].iter().map(|&i| self.dataset.get(i)).collect();
            Batch::collate(samples)
        }))
    }

    fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }
}

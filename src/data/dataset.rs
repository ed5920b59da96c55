use crate::data::batch::Batch;
use crate::tensor::Tensor;

/// Random-access collection of samples.
pub trait Dataset {
    fn len(&self) -> usize;

    /// Sample at `index`; `index < len()`.
    fn get(&self, index: usize) -> Batch;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D: Dataset + ?Sized> Dataset for Box<D> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Batch {
        (**self).get(index)
    }
}

/// Each element is one sample.
impl Dataset for Vec<Batch> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Batch {
        self[index].clone()
    }
}

/// Pairs the rows of an input tensor with the rows of a target tensor.
/// Sample `i` is `Batch::pair(inputs[i], targets[i])`, each a `1 x cols` row.
#[derive(Debug, Clone)]
pub struct TensorDataset {
    inputs: Tensor,
    targets: Tensor,
}

impl TensorDataset {
    /// # Panics
    /// Panics if the two tensors have a different number of rows.
    pub fn new(inputs: Tensor, targets: Tensor) -> TensorDataset {
        assert_eq!(
            inputs.rows, targets.rows,
            "inputs and targets must have equal length"
        );
        TensorDataset { inputs, targets }
    }

    pub fn from_rows(inputs: Vec<Vec<f64>>, targets: Vec<Vec<f64>>) -> TensorDataset {
        TensorDataset::new(Tensor::from_rows(inputs), Tensor::from_rows(targets))
    }

    pub fn inputs(&self) -> &Tensor {
        &self.inputs
    }

    pub fn targets(&self) -> &Tensor {
        &self.targets
    }
}

impl Dataset for TensorDataset {
    fn len(&self) -> usize {
        self.inputs.rows
    }

    fn get(&self, index: usize) -> Batch {
        let row = |t: &Tensor| Tensor::from_vec(1, t.cols, t.row(index).to_vec()).to(&t.device());
        Batch::pair(row(&self.inputs), row(&self.targets))
    }
}

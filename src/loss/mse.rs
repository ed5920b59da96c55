use crate::loss::loss::Loss;
use crate::tensor::Tensor;

pub struct MseLoss;

impl MseLoss {
    /// Mean squared error over every element of the batch:
    ///   L = mean((predicted - expected)²),  dL/dp = 2 (predicted - expected) / N
    pub fn loss(predicted: &Tensor, expected: &Tensor) -> Loss {
        let diff = predicted - expected;
        let n = diff.len() as f64;
        let value = diff.as_slice().iter().map(|d| d * d).sum::<f64>() / n;
        Loss::new(value, diff.scale(2.0 / n))
    }
}

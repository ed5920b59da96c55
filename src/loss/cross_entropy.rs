use crate::loss::loss::Loss;
use crate::tensor::Tensor;

/// Categorical cross-entropy for use with a Softmax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// Batch-mean cross-entropy:
    ///   L = -mean_over_rows(sum(expected * log(predicted + eps)))
    ///
    /// The gradient is taken with respect to the pre-softmax logits, where
    /// Softmax and cross-entropy compose to `(predicted - expected) / rows`.
    /// The Softmax activation's own derivative is identity for this reason.
    pub fn loss(predicted: &Tensor, expected: &Tensor) -> Loss {
        let rows = predicted.rows as f64;
        let value = predicted
            .as_slice()
            .iter()
            .zip(expected.as_slice())
            .map(|(p, e)| -e * (p + EPS).ln())
            .sum::<f64>()
            / rows;
        Loss::new(value, (predicted - expected).scale(1.0 / rows))
    }
}

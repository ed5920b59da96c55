use serde::{Deserialize, Serialize};
use std::f64::consts::E;

use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    Sigmoid,
    ReLU,
    Identity,
    Tanh,
    LeakyReLU { alpha: f64 },
    /// Row-wise softmax. Only meaningful as an output activation paired with
    /// cross-entropy, whose gradient already folds in the softmax Jacobian.
    Softmax,
}

impl Activation {
    /// Element-wise activation. `Softmax` is handled by [`Activation::apply`].
    pub fn function(&self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            Activation::ReLU => if x > 0.0 { x } else { 0.0 },
            Activation::Identity | Activation::Softmax => x,
            Activation::Tanh => x.tanh(),
            Activation::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    /// Element-wise derivative at the pre-activation value `x`.
    ///
    /// `Softmax` returns `1.0`: the cross-entropy gradient is already taken
    /// with respect to the logits, so the delta passes through unchanged.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            }
            Activation::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            Activation::Identity | Activation::Softmax => 1.0,
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Activation::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
        }
    }

    /// Activates a whole batch of pre-activations.
    pub fn apply(&self, z: &Tensor) -> Tensor {
        match self {
            Activation::Softmax => z.map_rows(softmax),
            other => z.map(|x| other.function(x)),
        }
    }

    pub fn derivative_at(&self, z: &Tensor) -> Tensor {
        z.map(|x| self.derivative(x))
    }
}

/// Numerically stable softmax of one row.
fn softmax(row: &[f64]) -> Vec<f64> {
    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = row.iter().map(|x| (x - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

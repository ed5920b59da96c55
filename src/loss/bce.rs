use crate::loss::loss::Loss;
use crate::tensor::Tensor;

pub struct BceLoss;

const EPS: f64 = 1e-12;

impl BceLoss {
    /// Binary cross-entropy, meant for a Sigmoid output:
    ///   L = -mean(y·log(p+ε) + (1-y)·log(1-p+ε))
    ///   dL/dp = (p - y) / ((p + ε) · (1 - p + ε)) / N
    pub fn loss(predicted: &Tensor, expected: &Tensor) -> Loss {
        let n = predicted.len() as f64;
        let pairs = || predicted.as_slice().iter().zip(expected.as_slice());
        let value = pairs()
            .map(|(p, y)| -(y * (p + EPS).ln() + (1.0 - y) * (1.0 - p + EPS).ln()))
            .sum::<f64>()
            / n;
        let grad: Vec<f64> = pairs()
            .map(|(p, y)| (p - y) / ((p + EPS) * (1.0 - p + EPS)) / n)
            .collect();
        let grad = Tensor::from_vec(predicted.rows, predicted.cols, grad).to(&predicted.device());
        Loss::new(value, grad)
    }
}

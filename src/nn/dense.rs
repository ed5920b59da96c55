use crate::device::Device;
use crate::error::{Result, TrainError};
use crate::nn::activation::Activation;
use crate::nn::module::{Module, Param};
use crate::tensor::Tensor;

/// Fully connected layer: `a = activation(x W + b)` over a batch of rows.
#[derive(Debug, Clone)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
    pub activation: Activation,
    weights_grad: Tensor,
    biases_grad: Tensor,
    // input and pre-activation of the last training-mode forward pass
    cache: Option<(Tensor, Tensor)>,
    training: bool,
}

impl Dense {
    /// Creates a layer mapping `input_size` features to `size` outputs.
    /// Weights use He init before ReLU-like activations, Xavier otherwise.
    pub fn new(input_size: usize, size: usize, activation: Activation) -> Dense {
        let weights = match activation {
            Activation::ReLU | Activation::LeakyReLU { .. } => Tensor::he(input_size, size),
            _ => Tensor::xavier(input_size, size),
        };
        Dense::from_parts(weights, Tensor::zeros(1, size), activation)
    }

    pub fn from_parts(weights: Tensor, biases: Tensor, activation: Activation) -> Dense {
        assert_eq!(biases.rows, 1, "biases must be a single row");
        assert_eq!(biases.cols, weights.cols, "biases must match the output width");
        Dense {
            weights_grad: Tensor::zeros_like(&weights),
            biases_grad: Tensor::zeros_like(&biases),
            weights,
            biases,
            activation,
            cache: None,
            training: true,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn output_size(&self) -> usize {
        self.weights.cols
    }

    pub fn weights_grad(&self) -> &Tensor {
        &self.weights_grad
    }

    pub fn biases_grad(&self) -> &Tensor {
        &self.biases_grad
    }
}

impl Module for Dense {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        if input.device() != self.weights.device() {
            return Err(TrainError::DeviceMismatch {
                expected: self.weights.device().to_string(),
                found: input.device().to_string(),
            });
        }
        if input.cols != self.input_size() {
            return Err(TrainError::contract(format!(
                "dense layer expects {} input features, got {}",
                self.input_size(),
                input.cols
            )));
        }

        let z = input.matmul(&self.weights).add_row(&self.biases);
        let a = self.activation.apply(&z);
        self.cache = if self.training { Some((input.clone(), z)) } else { None };
        Ok(a)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let (input, z) = self.cache.take().ok_or_else(|| {
            TrainError::contract("backward called without a training-mode forward pass")
        })?;

        // delta = dL/da * activation'(z)
        let delta = grad_output.hadamard(&self.activation.derivative_at(&z));

        self.weights_grad = &self.weights_grad + &input.transpose().matmul(&delta);
        self.biases_grad = &self.biases_grad + &delta.sum_rows();

        Ok(delta.matmul(&self.weights.transpose()))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.biases]
    }

    fn parameters_mut(&mut self) -> Vec<Param<'_>> {
        vec![
            Param { value: &mut self.weights, grad: &mut self.weights_grad },
            Param { value: &mut self.biases, grad: &mut self.biases_grad },
        ]
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        if !training {
            self.cache = None;
        }
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn to_device(&mut self, device: &Device) {
        self.weights = std::mem::take(&mut self.weights).to(device);
        self.biases = std::mem::take(&mut self.biases).to(device);
        self.weights_grad = std::mem::take(&mut self.weights_grad).to(device);
        self.biases_grad = std::mem::take(&mut self.biases_grad).to(device);
        self.cache = None;
    }

    fn device(&self) -> Device {
        self.weights.device()
    }
}

use crate::device::Device;
use crate::error::Result;
use crate::nn::activation::Activation;
use crate::nn::dense::Dense;
use crate::nn::module::{Module, Param};
use crate::tensor::Tensor;

/// Stack of modules applied in order.
pub struct Sequential {
    layers: Vec<Box<dyn Module>>,
    device: Device,
    training: bool,
}

impl Sequential {
    pub fn new(layers: Vec<Box<dyn Module>>) -> Sequential {
        Sequential { layers, device: Device::Cpu, training: true }
    }

    /// Builds a dense network from (input_size, size, activation) tuples.
    pub fn dense(layer_specs: Vec<(usize, usize, Activation)>) -> Sequential {
        let layers = layer_specs
            .into_iter()
            .map(|(input_size, size, activation)| {
                Box::new(Dense::new(input_size, size, activation)) as Box<dyn Module>
            })
            .collect();
        Sequential::new(layers)
    }

    pub fn push(&mut self, mut layer: Box<dyn Module>) {
        layer.to_device(&self.device);
        layer.set_training(self.training);
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Module for Sequential {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad)?;
        }
        Ok(grad)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<Param<'_>> {
        self.layers.iter_mut().flat_map(|l| l.parameters_mut()).collect()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        for layer in &mut self.layers {
            layer.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn to_device(&mut self, device: &Device) {
        self.device = *device;
        for layer in &mut self.layers {
            layer.to_device(device);
        }
    }

    fn device(&self) -> Device {
        self.device
    }
}

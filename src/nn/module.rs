use crate::device::Device;
use crate::error::Result;
use crate::tensor::Tensor;

/// A trainable parameter paired with its accumulated gradient.
pub struct Param<'a> {
    pub value: &'a mut Tensor,
    pub grad: &'a mut Tensor,
}

/// The compute graph the training loop drives.
///
/// The loop only ever talks to a model through this trait: it runs
/// `forward`, feeds the loss gradient to `backward`, hands the module to an
/// optimizer, and flips it between training and evaluation mode. In
/// evaluation mode a module must not cache activations, which is what
/// "gradient computation disabled" means for this backend.
pub trait Module {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    /// Accumulates parameter gradients for the last `forward` call and
    /// returns the gradient with respect to that call's input.
    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor>;

    fn parameters(&self) -> Vec<&Tensor>;

    fn parameters_mut(&mut self) -> Vec<Param<'_>>;

    fn zero_grad(&mut self) {
        for param in self.parameters_mut() {
            *param.grad = Tensor::zeros_like(&*param.value);
        }
    }

    fn set_training(&mut self, training: bool);

    fn is_training(&self) -> bool;

    fn to_device(&mut self, device: &Device);

    fn device(&self) -> Device;

    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }
}

/// Passes its input through unchanged. Has no parameters.
#[derive(Debug, Clone)]
pub struct Identity {
    device: Device,
    training: bool,
}

impl Identity {
    pub fn new() -> Self {
        Identity { device: Device::Cpu, training: true }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Identity::new()
    }
}

impl Module for Identity {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        Ok(input.clone())
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        Ok(grad_output.clone())
    }

    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<Param<'_>> {
        Vec::new()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn to_device(&mut self, device: &Device) {
        self.device = *device;
    }

    fn device(&self) -> Device {
        self.device
    }
}

use crate::tensor::Tensor;

/// Scalar loss of one batch together with its gradient with respect to the
/// model output, which is what the training loop backpropagates.
#[derive(Debug, Clone, PartialEq)]
pub struct Loss {
    value: f64,
    grad: Option<Tensor>,
}

impl Loss {
    pub fn new(value: f64, grad: Tensor) -> Loss {
        Loss { value, grad: Some(grad) }
    }

    /// A loss value with no gradient attached. Fine for validation; the
    /// training phase refuses to backpropagate it.
    pub fn detached(value: f64) -> Loss {
        Loss { value, grad: None }
    }

    /// Constant loss for `output`: `value` with an all-zero gradient, so an
    /// optimizer step leaves the parameters unchanged.
    pub fn constant(value: f64, output: &Tensor) -> Loss {
        Loss::new(value, Tensor::zeros_like(output))
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    pub fn is_detached(&self) -> bool {
        self.grad.is_none()
    }

    /// Drops the gradient, keeping the value.
    pub fn detach(self) -> Loss {
        Loss::detached(self.value)
    }
}

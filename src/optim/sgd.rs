use crate::nn::module::Module;
use crate::optim::optimizer::Optimizer;
use crate::tensor::Tensor;

/// Stochastic gradient descent with optional classical momentum.
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocities: Vec<Tensor>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, momentum: 0.0, velocities: Vec::new() }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Sgd {
        self.momentum = momentum;
        self
    }
}

impl Optimizer for Sgd {
    /// v = momentum * v + grad;  w -= lr * v
    fn step(&mut self, module: &mut dyn Module) {
        let lr = self.learning_rate;
        let momentum = self.momentum;
        let mut params = module.parameters_mut();

        // Velocity buffers are rebuilt whenever the parameter layout changes.
        let layout_matches = self.velocities.len() == params.len()
            && self.velocities.iter().zip(&params).all(|(v, p)| {
                v.shape() == p.value.shape() && v.device() == p.value.device()
            });
        if !layout_matches {
            self.velocities = params.iter().map(|p| Tensor::zeros_like(&*p.value)).collect();
        }

        for (param, velocity) in params.iter_mut().zip(self.velocities.iter_mut()) {
            let update = if momentum > 0.0 {
                *velocity = &velocity.scale(momentum) + &*param.grad;
                velocity.clone()
            } else {
                param.grad.clone()
            };
            *param.value = &*param.value - &update.scale(lr);
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}

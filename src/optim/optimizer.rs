use crate::nn::module::Module;

/// Applies parameter updates from the gradients a module has accumulated.
pub trait Optimizer {
    /// One update step over every parameter of `module`.
    fn step(&mut self, module: &mut dyn Module);

    /// Clears the accumulated gradients after a step.
    fn zero_grad(&mut self, module: &mut dyn Module) {
        module.zero_grad();
    }

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}

pub mod bce;
pub mod cross_entropy;
pub mod loss;
pub mod mse;

pub use bce::BceLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use loss::Loss;
pub use mse::MseLoss;

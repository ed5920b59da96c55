pub mod activation;
pub mod dense;
pub mod module;
pub mod sequential;

pub use activation::Activation;
pub use dense::Dense;
pub use module::{Identity, Module, Param};
pub use sequential::Sequential;

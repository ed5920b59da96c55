pub mod error;
pub mod device;
pub mod tensor;
pub mod nn;
pub mod loss;
pub mod optim;
pub mod data;
pub mod history;
pub mod train;

// Convenience re-exports
pub use error::{Result, TrainError};
pub use device::{Device, DeviceProbe, DeviceRequest, DeviceResolver, StaticProbe};
pub use tensor::Tensor;
pub use nn::{Activation, Dense, Identity, Module, Sequential};
pub use loss::{BceLoss, CrossEntropyLoss, Loss, MseLoss};
pub use optim::{Optimizer, Sgd};
pub use data::{Batch, BatchSource, Batches, Data, DataLoader, Dataset, TensorDataset};
pub use history::{History, Metrics};
pub use train::{
    Callback, CallbackContext, DisplayMode, EarlyStopping, ProgressCallback, RunConfig, RunState,
    Task, TrainConfig, TrainControl, Trainer,
};

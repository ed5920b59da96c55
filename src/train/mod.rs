pub mod callback;
pub mod config;
pub mod control;
pub mod early_stopping;
pub mod progress;
pub mod running;
pub mod task;
pub mod trainer;

pub use callback::{Callback, CallbackContext, CallbackList};
pub use config::{RunConfig, TrainConfig};
pub use control::{RunState, TrainControl};
pub use early_stopping::{EarlyStopping, MonitorMode};
pub use progress::{DisplayDetector, DisplayMode, EnvDisplayDetector, FixedDisplay, ProgressCallback};
pub use running::RunningStatistics;
pub use task::Task;
pub use trainer::Trainer;

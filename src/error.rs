//! Crate-wide error type.

use thiserror::Error;

/// Errors raised while setting up or running a training loop.
#[derive(Debug, Error)]
pub enum TrainError {
    /// An explicit device was requested with `force_device` set, but the
    /// hardware probe does not report it.
    #[error("Device {requested} not available (available: {available})")]
    DeviceUnavailable { requested: String, available: String },

    /// The device string could not be parsed at all.
    #[error("Unknown device identifier: {0}")]
    UnknownDevice(String),

    /// A tensor reached a module that lives on a different device.
    #[error("Device mismatch: expected {expected}, found {found}")]
    DeviceMismatch { expected: String, found: String },

    /// The caller (or the task definition) broke a contract the loop relies
    /// on: malformed batch shape, detached loss, missing data, ...
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Error returned from inside a callback hook.
    #[error("Callback {callback} failed: {source}")]
    Callback {
        callback: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrainError {
    /// Wraps an arbitrary error raised by user callback code.
    pub fn callback<E>(callback: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TrainError::Callback {
            callback: callback.into(),
            source: source.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        TrainError::ContractViolation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TrainError>;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrainError;

/// A compute target a tensor or module can live on.
///
/// The canonical string form (`Display`) is what device equality is judged
/// by when a request is matched against the hardware inventory: `"cuda"` and
/// `"cuda:0"` parse to the same device and print as `"cuda:0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Device {
    Cpu,
    /// CUDA accelerator by ordinal.
    Cuda(usize),
    /// Apple Metal accelerator.
    Mps,
}

impl Device {
    /// Position in the fixed preference order used by automatic resolution:
    /// accelerators first (lower CUDA ordinals first), the CPU last.
    pub fn preference_rank(&self) -> (u8, usize) {
        match self {
            Device::Cuda(index) => (0, *index),
            Device::Mps => (1, 0),
            Device::Cpu => (2, 0),
        }
    }

    pub fn is_accelerator(&self) -> bool {
        !matches!(self, Device::Cpu)
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(index) => write!(f, "cuda:{index}"),
            Device::Mps => write!(f, "mps"),
        }
    }
}

impl FromStr for Device {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            "mps" => Ok(Device::Mps),
            other => other
                .strip_prefix("cuda:")
                .and_then(|index| index.parse::<usize>().ok())
                .map(Device::Cuda)
                .ok_or_else(|| TrainError::UnknownDevice(s.to_string())),
        }
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

impl TryFrom<String> for Device {
    type Error = TrainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What the caller asked for: automatic selection or a named device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    Auto,
    /// Kept as the raw identifier so that identifiers the crate cannot parse
    /// still count as "unavailable" rather than failing early.
    Explicit(String),
}

impl DeviceRequest {
    /// Canonical string form of an explicit request. Parseable identifiers
    /// are normalised through `Device`, anything else is only trimmed and
    /// lower-cased.
    pub fn canonical(&self) -> String {
        match self {
            DeviceRequest::Auto => "auto".to_string(),
            DeviceRequest::Explicit(raw) => match raw.parse::<Device>() {
                Ok(device) => device.to_string(),
                Err(_) => raw.trim().to_ascii_lowercase(),
            },
        }
    }
}

impl From<&str> for DeviceRequest {
    fn from(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("auto") {
            DeviceRequest::Auto
        } else {
            DeviceRequest::Explicit(value.to_string())
        }
    }
}

impl From<Device> for DeviceRequest {
    fn from(device: Device) -> Self {
        DeviceRequest::Explicit(device.to_string())
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRequest::Auto => write!(f, "auto"),
            DeviceRequest::Explicit(raw) => write!(f, "{raw}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_equivalent_spellings_to_one_canonical_form() {
        let a: Device = "cuda".parse().unwrap();
        let b: Device = " CUDA:0 ".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "cuda:0");
    }

    #[test]
    fn rejects_unknown_identifiers() {
        assert!(matches!("tpu".parse::<Device>(), Err(TrainError::UnknownDevice(_))));
        assert!("cuda:x".parse::<Device>().is_err());
    }

    #[test]
    fn accelerators_rank_ahead_of_cpu() {
        let mut devices = vec![Device::Cpu, Device::Mps, Device::Cuda(1), Device::Cuda(0)];
        devices.sort_by_key(Device::preference_rank);
        assert_eq!(devices, vec![Device::Cuda(0), Device::Cuda(1), Device::Mps, Device::Cpu]);
    }

    #[test]
    fn request_from_str_detects_auto() {
        assert_eq!(DeviceRequest::from("Auto"), DeviceRequest::Auto);
        assert_eq!(DeviceRequest::from("cuda").canonical(), "cuda:0");
        assert_eq!(DeviceRequest::from("TPU").canonical(), "tpu");
    }

    #[test]
    fn serializes_as_canonical_string() {
        let json = serde_json::to_string(&Device::Cuda(2)).unwrap();
        assert_eq!(json, "\"cuda:2\"");
        let back: Device = serde_json::from_str("\"cpu\"").unwrap();
        assert_eq!(back, Device::Cpu);
    }
}

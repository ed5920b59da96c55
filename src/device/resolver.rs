use tracing::debug;

use crate::device::device::{Device, DeviceRequest};
use crate::error::{Result, TrainError};

/// Reports which devices the current machine can compute on.
pub trait DeviceProbe {
    fn available(&self) -> Vec<Device>;
}

impl<P: DeviceProbe + ?Sized> DeviceProbe for Box<P> {
    fn available(&self) -> Vec<Device> {
        (**self).available()
    }
}

/// Probe for the bundled reference backend, which only computes on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl DeviceProbe for HostProbe {
    fn available(&self) -> Vec<Device> {
        vec![Device::Cpu]
    }
}

/// Probe with a fixed inventory, for backends that enumerate their own
/// devices (and for tests).
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    devices: Vec<Device>,
}

impl StaticProbe {
    pub fn new(devices: Vec<Device>) -> Self {
        StaticProbe { devices }
    }
}

impl DeviceProbe for StaticProbe {
    fn available(&self) -> Vec<Device> {
        self.devices.clone()
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub device: Device,
    /// The explicit request could not be honoured and `device` is the
    /// automatic choice instead.
    pub fell_back: bool,
    pub requested: DeviceRequest,
}

impl Resolution {
    /// The single user-facing line announcing the compute device.
    pub fn summary(&self) -> String {
        if self.fell_back {
            format!("Device {} not available, using {}", self.requested, self.device)
        } else {
            format!("Using {}", self.device)
        }
    }
}

/// Picks the compute device for a run.
///
/// `"auto"` always succeeds with the best available device according to
/// [`Device::preference_rank`]. An explicit request is honoured when its
/// canonical string form matches an available device; otherwise it fails
/// with [`TrainError::DeviceUnavailable`] when `force` is set, or falls back
/// to the automatic choice.
#[derive(Debug, Clone, Default)]
pub struct DeviceResolver<P = HostProbe> {
    probe: P,
}

impl<P: DeviceProbe> DeviceResolver<P> {
    pub fn new(probe: P) -> Self {
        DeviceResolver { probe }
    }

    /// Best available device; the CPU when the probe reports nothing.
    pub fn auto(&self) -> Device {
        self.probe
            .available()
            .into_iter()
            .min_by_key(Device::preference_rank)
            .unwrap_or(Device::Cpu)
    }

    pub fn resolve(&self, requested: &DeviceRequest, force: bool) -> Result<Resolution> {
        let auto = self.auto();

        let wanted = match requested {
            DeviceRequest::Auto => {
                debug!(device = %auto, "auto-resolved compute device");
                return Ok(Resolution {
                    device: auto,
                    fell_back: false,
                    requested: requested.clone(),
                });
            }
            DeviceRequest::Explicit(_) => requested.canonical(),
        };

        let available = self.probe.available();
        if let Some(device) = available.iter().find(|d| d.to_string() == wanted) {
            return Ok(Resolution {
                device: *device,
                fell_back: false,
                requested: requested.clone(),
            });
        }

        if force {
            let available = available
                .iter()
                .map(Device::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(TrainError::DeviceUnavailable {
                requested: wanted,
                available,
            });
        }

        debug!(requested = %wanted, fallback = %auto, "requested device unavailable");
        Ok(Resolution {
            device: auto,
            fell_back: true,
            requested: requested.clone(),
        })
    }
}

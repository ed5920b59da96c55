pub mod device;
pub mod resolver;

pub use device::{Device, DeviceRequest};
pub use resolver::{DeviceProbe, DeviceResolver, HostProbe, Resolution, StaticProbe};

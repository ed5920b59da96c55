use crate::data::batch::Batch;
use crate::device::Device;
use crate::tensor::Tensor;

/// Values that can be moved to a compute device.
///
/// Containers relocate their contents recursively; leaves that are not
/// tensors come back untouched.
pub trait ToDevice {
    fn to_device(self, device: &Device) -> Self;
}

impl ToDevice for Tensor {
    fn to_device(self, device: &Device) -> Self {
        self.to(device)
    }
}

impl ToDevice for Batch {
    fn to_device(self, device: &Device) -> Self {
        match self {
            Batch::Tensor(t) => Batch::Tensor(t.to(device)),
            Batch::Seq(items) => Batch::Seq(items.to_device(device)),
            Batch::Map(fields) => Batch::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.to_device(device)))
                    .collect(),
            ),
            leaf @ (Batch::Scalar(_) | Batch::Text(_)) => leaf,
        }
    }
}

impl<T: ToDevice> ToDevice for Vec<T> {
    fn to_device(self, device: &Device) -> Self {
        self.into_iter().map(|item| item.to_device(device)).collect()
    }
}

impl<T: ToDevice> ToDevice for Option<T> {
    fn to_device(self, device: &Device) -> Self {
        self.map(|item| item.to_device(device))
    }
}

/// Errors pass through; only a successfully produced batch is moved.
impl<T: ToDevice, E> ToDevice for Result<T, E> {
    fn to_device(self, device: &Device) -> Self {
        self.map(|item| item.to_device(device))
    }
}

impl<A: ToDevice, B: ToDevice> ToDevice for (A, B) {
    fn to_device(self, device: &Device) -> Self {
        (self.0.to_device(device), self.1.to_device(device))
    }
}

impl<A: ToDevice, B: ToDevice, C: ToDevice> ToDevice for (A, B, C) {
    fn to_device(self, device: &Device) -> Self {
        (
            self.0.to_device(device),
            self.1.to_device(device),
            self.2.to_device(device),
        )
    }
}

macro_rules! impl_to_device_leaf {
    ($($ty:ty),*) => {
        $(impl ToDevice for $ty {
            fn to_device(self, _device: &Device) -> Self {
                self
            }
        })*
    };
}

impl_to_device_leaf!(f32, f64, i32, i64, u32, u64, usize, bool, String);

/// Lazily relocates every item of the wrapped iterator to one device.
///
/// Ends when the inner iterator ends. Build a new one per pass.
pub struct OnDevice<I> {
    inner: I,
    device: Device,
}

impl<I> OnDevice<I> {
    pub fn new(inner: I, device: Device) -> OnDevice<I> {
        OnDevice { inner, device }
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl<I> Iterator for OnDevice<I>
where
    I: Iterator,
    I::Item: ToDevice,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| item.to_device(&self.device))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Wraps `batches` so that each yielded item lives on `device`.
pub fn load_on_device<I>(batches: I, device: Device) -> OnDevice<I::IntoIter>
where
    I: IntoIterator,
    I::Item: ToDevice,
{
    OnDevice::new(batches.into_iter(), device)
}

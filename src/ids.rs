//! Instance numbering for attached sensors

use parking_lot::Mutex;

/// Prefix of every device name
pub const DEVICE_NAME_PREFIX: &str = "adxl345";

/// Hands out instance ids in increasing order
///
/// Owned by whoever attaches devices and passed to [`Device::attach`]; ids
/// are never reused for the allocator's lifetime.
///
/// [`Device::attach`]: crate::Device::attach
#[derive(Debug, Default)]
pub struct InstanceIdAllocator {
    next: Mutex<u32>,
}

impl InstanceIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `first`
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: Mutex::new(first),
        }
    }

    pub fn allocate(&self) -> u32 {
        let mut next = self.next.lock();
        let id = *next;
        *next = next.wrapping_add(1);
        id
    }
}

/// Name a device is exposed under, e.g. `adxl345-0`
pub fn device_name(id: u32) -> String {
    format!("{}-{}", DEVICE_NAME_PREFIX, id)
}

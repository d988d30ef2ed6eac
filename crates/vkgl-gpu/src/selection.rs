//! Physical device and queue family selection policies.

use std::fmt;
use std::sync::Arc;

use ash::vk;

use crate::capabilities::{DeviceType, PhysicalDeviceDescriptor};

/// Picks one device out of the enumerated list.
pub type DevicePicker = Arc<dyn Fn(&[PhysicalDeviceDescriptor]) -> Option<usize> + Send + Sync>;

/// How [`select_physical_device`](crate::context::select_physical_device) chooses a GPU.
#[derive(Clone, Default)]
pub enum SelectionStrategy {
    /// First enumerated device. Ignores capabilities entirely.
    #[default]
    First,
    /// Device at a fixed enumeration index.
    Index(usize),
    /// First device whose name contains the substring.
    NameContains(String),
    /// First device of the given type, or the first device if none matches.
    PreferType(DeviceType),
    /// Caller-supplied policy returning an index into the list.
    Custom(DevicePicker),
}

impl SelectionStrategy {
    /// Apply the strategy. Returns an index into `devices`.
    pub fn choose(&self, devices: &[PhysicalDeviceDescriptor]) -> Option<usize> {
        if devices.is_empty() {
            return None;
        }
        match self {
            Self::First => Some(0),
            Self::Index(index) => (*index < devices.len()).then_some(*index),
            Self::NameContains(needle) => devices.iter().position(|d| d.name.contains(needle)),
            Self::PreferType(ty) => devices
                .iter()
                .position(|d| d.device_type == *ty)
                .or(Some(0)),
            Self::Custom(pick) => pick(devices).filter(|i| *i < devices.len()),
        }
    }
}

impl fmt::Debug for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("First"),
            Self::Index(i) => f.debug_tuple("Index").field(i).finish(),
            Self::NameContains(s) => f.debug_tuple("NameContains").field(s).finish(),
            Self::PreferType(ty) => f.debug_tuple("PreferType").field(ty).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Index of the first queue family that supports graphics.
pub fn find_graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|f| f.queue_count > 0 && f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .and_then(|i| u32::try_from(i).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::GpuVendor;

    fn device(index: usize, name: &str, device_type: DeviceType) -> PhysicalDeviceDescriptor {
        PhysicalDeviceDescriptor {
            index,
            handle: vk::PhysicalDevice::null(),
            name: name.into(),
            device_type,
            vendor: GpuVendor::Other(0),
            api_version: vk::API_VERSION_1_3,
            driver_version: 0,
            max_image_dimension_2d: 4096,
            extensions: Vec::new(),
        }
    }

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn first_is_deterministic() {
        let devices = [
            device(0, "llvmpipe", DeviceType::Cpu),
            device(1, "Radeon", DeviceType::Discrete),
        ];
        assert_eq!(SelectionStrategy::First.choose(&devices), Some(0));
        assert_eq!(SelectionStrategy::First.choose(&devices), Some(0));
        assert_eq!(SelectionStrategy::First.choose(&[]), None);
    }

    #[test]
    fn named_strategies() {
        let devices = [
            device(0, "llvmpipe", DeviceType::Cpu),
            device(1, "Radeon", DeviceType::Discrete),
        ];
        assert_eq!(SelectionStrategy::Index(1).choose(&devices), Some(1));
        assert_eq!(SelectionStrategy::Index(2).choose(&devices), None);
        assert_eq!(
            SelectionStrategy::NameContains("Rade".into()).choose(&devices),
            Some(1)
        );
        assert_eq!(
            SelectionStrategy::PreferType(DeviceType::Discrete).choose(&devices),
            Some(1)
        );
        assert_eq!(
            SelectionStrategy::PreferType(DeviceType::Virtual).choose(&devices),
            Some(0)
        );
        let last = SelectionStrategy::Custom(Arc::new(|d| Some(d.len() - 1)));
        assert_eq!(last.choose(&devices), Some(1));
    }

    #[test]
    fn graphics_family_search() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        assert_eq!(find_graphics_queue_family(&families), Some(2));
        assert_eq!(find_graphics_queue_family(&families[..2]), None);
        assert_eq!(find_graphics_queue_family(&[]), None);
    }
}

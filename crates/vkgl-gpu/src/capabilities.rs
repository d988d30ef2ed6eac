//! Physical device description.

use ash::vk;

use crate::driver::InstanceDriver;
use crate::error::Result;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Kind of physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl From<vk::PhysicalDeviceType> for DeviceType {
    fn from(ty: vk::PhysicalDeviceType) -> Self {
        match ty {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::Integrated,
            vk::PhysicalDeviceType::VIRTUAL_GPU => Self::Virtual,
            vk::PhysicalDeviceType::CPU => Self::Cpu,
            _ => Self::Other,
        }
    }
}

/// Immutable snapshot of one enumerated physical device.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceDescriptor {
    /// Position in the enumeration order
    pub index: usize,
    /// Raw handle, valid for the lifetime of the instance
    pub handle: vk::PhysicalDevice,
    /// Device name
    pub name: String,
    pub device_type: DeviceType,
    pub vendor: GpuVendor,
    /// Vulkan API version
    pub api_version: u32,
    /// Driver version
    pub driver_version: u32,
    /// Largest supported width or height of a 2D image
    pub max_image_dimension_2d: u32,
    /// Supported device extensions, sorted
    pub extensions: Vec<String>,
}

impl PhysicalDeviceDescriptor {
    /// Query a descriptor for the device at `index` in the enumeration order.
    pub fn query(
        instance: &dyn InstanceDriver,
        index: usize,
        handle: vk::PhysicalDevice,
    ) -> Result<Self> {
        let properties = instance.properties(handle);
        let mut extensions = instance.device_extensions(handle)?;
        extensions.sort();
        extensions.dedup();

        Ok(Self {
            index,
            handle,
            name: properties.name,
            device_type: properties.device_type.into(),
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            max_image_dimension_2d: properties.max_image_dimension_2d,
            extensions,
        })
    }

    /// Returns true if the device advertises the named extension.
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions
            .binary_search_by(|ext| ext.as_str().cmp(name))
            .is_ok()
    }

    /// Get a human-readable summary of the device.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{} - {} extensions",
            self.name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.extensions.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn extension_lookup_uses_sorted_list() {
        let descriptor = PhysicalDeviceDescriptor {
            index: 0,
            handle: vk::PhysicalDevice::null(),
            name: "Test GPU".into(),
            device_type: DeviceType::Discrete,
            vendor: GpuVendor::Amd,
            api_version: vk::API_VERSION_1_3,
            driver_version: 1,
            max_image_dimension_2d: 16384,
            extensions: vec![
                "VK_KHR_external_memory".into(),
                "VK_KHR_external_memory_fd".into(),
            ],
        };
        assert!(descriptor.has_extension("VK_KHR_external_memory_fd"));
        assert!(!descriptor.has_extension("VK_KHR_swapchain"));
    }
}

//! Driver seam between the device logic and the Vulkan implementation.
//!
//! The functions in [`context`](crate::context), [`image`](crate::image),
//! [`memory`](crate::memory) and [`export`](crate::export) talk to the driver
//! only through these traits. [`vulkan`](crate::vulkan) implements them with
//! `ash`; tests implement them with an in-memory model.

use std::sync::Arc;

use ash::vk;
use vkgl_core::{Extent2D, HandleType, NativeMemoryHandle, PixelFormat};

use crate::config::InstanceConfig;
use crate::error::Result;

/// Entry point into a Vulkan implementation.
pub trait DriverLoader {
    /// Names of every available instance layer.
    fn instance_layers(&self) -> Result<Vec<String>>;

    /// Names of every available instance extension.
    fn instance_extensions(&self) -> Result<Vec<String>>;

    /// Create an instance with the layers and extensions listed in `config`.
    ///
    /// Availability has already been checked by the caller.
    fn create_instance(&self, config: &InstanceConfig) -> Result<Arc<dyn InstanceDriver>>;
}

/// Plain-data subset of `VkPhysicalDeviceProperties`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub vendor_id: u32,
    pub device_id: u32,
    pub api_version: u32,
    pub driver_version: u32,
    pub max_image_dimension_2d: u32,
}

/// Instance-level queries and device creation.
pub trait InstanceDriver: Send + Sync {
    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>>;

    fn properties(&self, physical_device: vk::PhysicalDevice) -> DeviceProperties;

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties>;

    /// Names of the device extensions the physical device supports.
    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>>;

    fn memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties;

    /// Create a logical device with one queue from `queue_family`.
    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[String],
    ) -> Result<Arc<dyn DeviceDriver>>;
}

/// Parameters for a 2D, single-mip, single-layer, optimally tiled image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCreateDesc {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub usage: vk::ImageUsageFlags,
    pub export: Option<HandleType>,
}

/// Parameters for a single device memory allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAllocateDesc {
    pub size: u64,
    pub memory_type_index: u32,
    pub export: Option<HandleType>,
    /// Image this allocation is dedicated to.
    pub dedicated_image: Option<vk::Image>,
}

/// Destination of a host upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTarget {
    pub image: vk::Image,
    pub extent: Extent2D,
    pub format: PixelFormat,
    /// Release ownership to `VK_QUEUE_FAMILY_EXTERNAL` after the copy.
    pub release_to_external: bool,
}

/// Device-level object creation and destruction.
pub trait DeviceDriver: Send + Sync {
    fn create_image(&self, desc: &ImageCreateDesc) -> Result<vk::Image>;

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    fn allocate_memory(&self, desc: &MemoryAllocateDesc) -> Result<vk::DeviceMemory>;

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<()>;

    /// Resolve the export entry point for `handle_type`.
    ///
    /// Fails with [`GpuError::FunctionNotLoaded`](crate::GpuError::FunctionNotLoaded)
    /// if the driver does not expose it.
    fn load_memory_export(&self, handle_type: HandleType) -> Result<Arc<dyn MemoryExportFns>>;

    /// Copy tightly packed `pixels` into `target` and block until the copy is complete.
    fn upload_image(&self, target: &UploadTarget, pixels: &[u8]) -> Result<()>;

    fn destroy_image(&self, image: vk::Image);

    fn free_memory(&self, memory: vk::DeviceMemory);

    fn wait_idle(&self) -> Result<()>;
}

/// Resolved export entry point.
pub trait MemoryExportFns: Send + Sync {
    /// Handle type this entry point produces.
    fn handle_type(&self) -> HandleType;

    /// Create a new OS handle referencing `memory`.
    fn export(&self, memory: vk::DeviceMemory) -> Result<NativeMemoryHandle>;
}

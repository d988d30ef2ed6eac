//! Vulkan side of the vkgl memory sharing chain.
//!
//! This crate provides:
//! - Instance creation, device selection and logical device management
//! - Exportable image creation and dedicated memory allocation
//! - Native handle export through a two-phase loaded entry point
//! - Host fills synchronized with a fence
//! - A driver seam ([`driver`]) with an `ash` implementation ([`vulkan`])

pub mod capabilities;
pub mod config;
pub mod context;
pub mod convert;
pub mod driver;
pub mod error;
pub mod export;
pub mod image;
pub mod memory;
pub mod selection;
pub mod upload;
pub mod vulkan;

pub use capabilities::{DeviceType, GpuVendor, PhysicalDeviceDescriptor};
pub use config::{DeviceConfig, InstanceConfig};
pub use context::{
    create_instance, create_logical_device, has_extension, list_device_extensions,
    select_physical_device, GpuContext, GpuContextBuilder, GraphicsInstance, LogicalDevice,
};
pub use driver::{DeviceDriver, DriverLoader, InstanceDriver, MemoryExportFns};
pub use error::{GpuError, Result};
pub use export::HandleExporter;
pub use image::{create_image, Image, ImageDesc};
pub use memory::{
    allocate_device_memory, allocate_exportable_memory, bind, find_memory_type, BoundImage,
    ExportableAllocation,
};
pub use selection::{find_graphics_queue_family, SelectionStrategy};
pub use upload::fill_image;
pub use vulkan::AshLoader;

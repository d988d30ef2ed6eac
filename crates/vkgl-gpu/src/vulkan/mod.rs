//! `ash` implementation of the driver traits.

mod device;
mod export;
mod staging;
mod submit;

pub use device::AshDevice;
pub use staging::{StagingAllocator, StagingBuffer};

use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use ash::vk;

use crate::config::InstanceConfig;
use crate::driver::{DeviceDriver, DeviceProperties, DriverLoader, InstanceDriver};
use crate::error::{GpuError, Result};

fn to_cstrings(names: &[String]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|n| {
            CString::new(n.as_str())
                .map_err(|_| GpuError::Initialization(format!("Invalid name {n:?}")))
        })
        .collect()
}

fn c_str_lossy(name: std::result::Result<&CStr, std::ffi::FromBytesUntilNulError>) -> String {
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Loads the system Vulkan library.
pub struct AshLoader {
    entry: ash::Entry,
}

impl AshLoader {
    /// Load the Vulkan entry points.
    pub fn new() -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Initialization(format!("Failed to load Vulkan: {e}")))?;
        Ok(Self { entry })
    }
}

impl DriverLoader for AshLoader {
    fn instance_layers(&self) -> Result<Vec<String>> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties()? };
        Ok(layers
            .iter()
            .map(|l| c_str_lossy(l.layer_name_as_c_str()))
            .collect())
    }

    fn instance_extensions(&self) -> Result<Vec<String>> {
        let extensions = unsafe { self.entry.enumerate_instance_extension_properties(None)? };
        Ok(extensions
            .iter()
            .map(|e| c_str_lossy(e.extension_name_as_c_str()))
            .collect())
    }

    fn create_instance(&self, config: &InstanceConfig) -> Result<Arc<dyn InstanceDriver>> {
        let app_name = CString::new(config.app_name.as_str())
            .map_err(|_| GpuError::Initialization("Invalid application name".to_string()))?;
        let engine_name = c"vkgl";

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        #[allow(unused_mut)]
        let mut extensions = config.required_instance_extensions.clone();
        #[cfg(target_os = "macos")]
        extensions.push("VK_KHR_portability_enumeration".to_string());

        let extensions = to_cstrings(&extensions)?;
        let extension_names: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

        let layers = to_cstrings(&config.layers())?;
        let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

        // Required for MoltenVK on macOS
        #[cfg(target_os = "macos")]
        let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        #[cfg(not(target_os = "macos"))]
        let create_flags = vk::InstanceCreateFlags::empty();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(create_flags);

        let instance = unsafe { self.entry.create_instance(&create_info, None)? };

        Ok(Arc::new(AshInstance {
            _entry: self.entry.clone(),
            instance,
        }))
    }
}

/// Vulkan instance created through [`AshLoader`].
pub struct AshInstance {
    // Entry must be kept alive for the lifetime of the instance
    _entry: ash::Entry,
    instance: ash::Instance,
}

impl InstanceDriver for AshInstance {
    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        Ok(unsafe { self.instance.enumerate_physical_devices()? })
    }

    fn properties(&self, physical_device: vk::PhysicalDevice) -> DeviceProperties {
        let props = unsafe { self.instance.get_physical_device_properties(physical_device) };
        DeviceProperties {
            name: c_str_lossy(props.device_name_as_c_str()),
            device_type: props.device_type,
            vendor_id: props.vendor_id,
            device_id: props.device_id,
            api_version: props.api_version,
            driver_version: props.driver_version,
            max_image_dimension_2d: props.limits.max_image_dimension2_d,
        }
    }

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(physical_device)
        }
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>> {
        let extensions = unsafe {
            self.instance
                .enumerate_device_extension_properties(physical_device)?
        };
        Ok(extensions
            .iter()
            .map(|e| c_str_lossy(e.extension_name_as_c_str()))
            .collect())
    }

    fn memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties {
        unsafe {
            self.instance
                .get_physical_device_memory_properties(physical_device)
        }
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[String],
    ) -> Result<Arc<dyn DeviceDriver>> {
        let device = unsafe {
            AshDevice::new(&self.instance, physical_device, queue_family, extensions)?
        };
        Ok(Arc::new(device))
    }
}

impl Drop for AshInstance {
    fn drop(&mut self) {
        tracing::debug!("Destroying Vulkan instance");
        unsafe { self.instance.destroy_instance(None) };
    }
}

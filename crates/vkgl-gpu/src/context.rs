//! Instance, physical device and logical device management.

use std::sync::Arc;

use ash::vk;
use vkgl_core::HandleType;

use crate::capabilities::PhysicalDeviceDescriptor;
use crate::config::{DeviceConfig, InstanceConfig};
use crate::driver::{DeviceDriver, DriverLoader, InstanceDriver};
use crate::error::{GpuError, Result};
use crate::selection::{find_graphics_queue_family, SelectionStrategy};

/// Connection to a Vulkan implementation.
///
/// Cloning is cheap; the instance is destroyed when the last clone and the
/// last device created from it are dropped.
#[derive(Clone)]
pub struct GraphicsInstance {
    driver: Arc<dyn InstanceDriver>,
    config: Arc<InstanceConfig>,
}

impl GraphicsInstance {
    /// Get the instance driver.
    pub fn driver(&self) -> &dyn InstanceDriver {
        self.driver.as_ref()
    }

    /// Get the config the instance was created with.
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Describe every enumerated physical device, in enumeration order.
    pub fn physical_devices(&self) -> Result<Vec<PhysicalDeviceDescriptor>> {
        self.driver
            .enumerate_physical_devices()?
            .into_iter()
            .enumerate()
            .map(|(index, handle)| PhysicalDeviceDescriptor::query(self.driver(), index, handle))
            .collect()
    }
}

impl std::fmt::Debug for GraphicsInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsInstance")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Create a Vulkan instance.
///
/// Every requested layer and instance extension must be available.
pub fn create_instance(loader: &dyn DriverLoader, config: &InstanceConfig) -> Result<GraphicsInstance> {
    let available_layers = loader.instance_layers()?;
    for layer in config.layers() {
        if !available_layers.contains(&layer) {
            return Err(GpuError::Initialization(format!(
                "Layer {layer} not available"
            )));
        }
    }

    let available_extensions = loader.instance_extensions()?;
    for ext in &config.required_instance_extensions {
        if !available_extensions.contains(ext) {
            return Err(GpuError::Initialization(format!(
                "Instance extension {ext} not available"
            )));
        }
    }

    let driver = loader.create_instance(config)?;
    tracing::info!(
        "Created Vulkan instance for '{}' (validation: {})",
        config.app_name,
        config.enable_validation
    );

    Ok(GraphicsInstance {
        driver,
        config: Arc::new(config.clone()),
    })
}

/// Pick a physical device according to `strategy`.
pub fn select_physical_device(
    instance: &GraphicsInstance,
    strategy: &SelectionStrategy,
) -> Result<PhysicalDeviceDescriptor> {
    let devices = instance.physical_devices()?;
    if devices.is_empty() {
        return Err(GpuError::Initialization(
            "No Vulkan physical devices found".to_string(),
        ));
    }

    let index = strategy.choose(&devices).ok_or_else(|| {
        GpuError::Initialization(format!("No physical device matches {strategy:?}"))
    })?;

    let selected = devices.into_iter().nth(index).ok_or_else(|| {
        GpuError::Initialization(format!("Selected device index {index} out of range"))
    })?;
    tracing::info!("Selected GPU: {}", selected.summary());
    Ok(selected)
}

/// Every device extension the physical device supports.
pub fn list_device_extensions(
    instance: &GraphicsInstance,
    physical_device: &PhysicalDeviceDescriptor,
) -> Result<Vec<String>> {
    let mut extensions = instance.driver.device_extensions(physical_device.handle)?;
    extensions.sort();
    Ok(extensions)
}

/// Returns true if the physical device supports the named extension.
pub fn has_extension(physical_device: &PhysicalDeviceDescriptor, name: &str) -> bool {
    physical_device.has_extension(name)
}

struct DeviceShared {
    // Declared before `instance` so the device is destroyed first.
    driver: Arc<dyn DeviceDriver>,
    instance: GraphicsInstance,
    physical_device: PhysicalDeviceDescriptor,
    queue_family: u32,
    extensions: Vec<String>,
}

/// Logical device with one graphics queue.
///
/// Every image and allocation holds a clone, so none of them can outlive the
/// device, and the device cannot outlive its instance.
#[derive(Clone)]
pub struct LogicalDevice {
    shared: Arc<DeviceShared>,
}

impl LogicalDevice {
    /// Get the device driver.
    pub fn driver(&self) -> &dyn DeviceDriver {
        self.shared.driver.as_ref()
    }

    /// Get the instance this device was created from.
    pub fn instance(&self) -> &GraphicsInstance {
        &self.shared.instance
    }

    /// Get the physical device descriptor.
    pub fn physical_device(&self) -> &PhysicalDeviceDescriptor {
        &self.shared.physical_device
    }

    /// Get the graphics queue family index.
    pub fn queue_family(&self) -> u32 {
        self.shared.queue_family
    }

    /// Device extensions enabled at creation.
    pub fn enabled_extensions(&self) -> &[String] {
        &self.shared.extensions
    }

    /// Returns true if the extension was enabled at creation.
    pub fn is_extension_enabled(&self, name: &str) -> bool {
        self.shared.extensions.iter().any(|e| e == name)
    }

    /// Memory types and heaps of the physical device.
    pub fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        self.shared
            .instance
            .driver()
            .memory_properties(self.shared.physical_device.handle)
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        self.shared.driver.wait_idle()
    }
}

impl std::fmt::Debug for LogicalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalDevice")
            .field("physical_device", &self.shared.physical_device.name)
            .field("queue_family", &self.shared.queue_family)
            .finish_non_exhaustive()
    }
}

/// Open a logical device with one graphics queue at priority 1.0.
pub fn create_logical_device(
    instance: &GraphicsInstance,
    physical_device: &PhysicalDeviceDescriptor,
    required_extensions: &[String],
) -> Result<LogicalDevice> {
    for ext in required_extensions {
        if !physical_device.has_extension(ext) {
            return Err(GpuError::ExtensionNotSupported(ext.clone()));
        }
    }

    let families = instance
        .driver
        .queue_family_properties(physical_device.handle);
    let queue_family =
        find_graphics_queue_family(&families).ok_or_else(|| GpuError::NoGraphicsQueue {
            device: physical_device.name.clone(),
        })?;

    let driver = instance
        .driver
        .create_device(physical_device.handle, queue_family, required_extensions)?;
    tracing::debug!(
        "Created logical device on {} (queue family {queue_family}, {} extensions)",
        physical_device.name,
        required_extensions.len()
    );

    Ok(LogicalDevice {
        shared: Arc::new(DeviceShared {
            driver,
            instance: instance.clone(),
            physical_device: physical_device.clone(),
            queue_family,
            extensions: required_extensions.to_vec(),
        }),
    })
}

/// Instance, selected GPU and logical device, created together.
pub struct GpuContext {
    pub device: LogicalDevice,
    pub instance: GraphicsInstance,
    pub physical_device: PhysicalDeviceDescriptor,
    pub handle_type: HandleType,
}

/// Builder for creating a GPU context.
#[derive(Debug, Clone, Default)]
pub struct GpuContextBuilder {
    instance: InstanceConfig,
    device: DeviceConfig,
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.instance.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.instance.enable_validation = enable;
        self
    }

    /// Set the device selection strategy.
    pub fn strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.device.strategy = strategy;
        self
    }

    /// Set the handle type exported memory will use.
    pub fn handle_type(mut self, handle_type: HandleType) -> Self {
        self.device.handle_type = handle_type;
        self
    }

    /// Replace the instance config.
    pub fn instance_config(mut self, config: InstanceConfig) -> Self {
        self.instance = config;
        self
    }

    /// Replace the device config.
    pub fn device_config(mut self, config: DeviceConfig) -> Self {
        self.device = config;
        self
    }

    /// Build the context against the system Vulkan loader.
    pub fn build(self) -> Result<GpuContext> {
        let loader = crate::vulkan::AshLoader::new()?;
        self.build_with(&loader)
    }

    /// Build the context against an explicit loader.
    pub fn build_with(self, loader: &dyn DriverLoader) -> Result<GpuContext> {
        let instance = create_instance(loader, &self.instance)?;
        let physical_device = select_physical_device(&instance, &self.device.strategy)?;
        let device = create_logical_device(
            &instance,
            &physical_device,
            &self.device.required_extensions(),
        )?;

        Ok(GpuContext {
            device,
            instance,
            physical_device,
            handle_type: self.device.handle_type,
        })
    }
}

//! In-memory implementation of the `vkgl-gpu` driver traits.

use std::sync::Arc;

use ash::vk::{self, Handle};
use vkgl_core::constants::VALIDATION_LAYER;
use vkgl_core::{HandleType, NativeMemoryHandle};
use vkgl_gpu::driver::{
    DeviceDriver, DeviceProperties, DriverLoader, ImageCreateDesc, InstanceDriver,
    MemoryAllocateDesc, MemoryExportFns, UploadTarget,
};
use vkgl_gpu::{GpuError, InstanceConfig, Result};

use super::world::{MockEvent, MockImage, MockMemory, MockWorld};

/// Description of one mock physical device.
#[derive(Debug, Clone)]
pub struct MockDeviceSpec {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub vendor_id: u32,
    pub api_version: u32,
    pub max_image_dimension_2d: u32,
    pub extensions: Vec<String>,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Property flags of each memory type, in index order.
    pub memory_types: Vec<vk::MemoryPropertyFlags>,
    /// Allocation sizes are rounded up to this.
    pub allocation_alignment: u64,
    /// Whether `load_memory_export` resolves an entry point.
    pub export_entry_point: bool,
}

impl MockDeviceSpec {
    /// Discrete GPU with one graphics family and fd export support.
    pub fn graphics(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            vendor_id: 0x10DE,
            api_version: vk::make_api_version(0, 1, 3, 0),
            max_image_dimension_2d: 16384,
            extensions: vec![
                "VK_KHR_external_memory".to_string(),
                "VK_KHR_external_memory_fd".to_string(),
                "VK_KHR_swapchain".to_string(),
            ],
            queue_families: vec![queue_family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1)],
            memory_types: vec![
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ],
            allocation_alignment: 4096,
            export_entry_point: true,
        }
    }

    pub fn with_device_type(mut self, device_type: vk::PhysicalDeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    pub fn with_queue_families(mut self, families: Vec<vk::QueueFamilyProperties>) -> Self {
        self.queue_families = families;
        self
    }

    pub fn with_memory_types(mut self, types: Vec<vk::MemoryPropertyFlags>) -> Self {
        self.memory_types = types;
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| (*e).to_string()).collect();
        self
    }

    pub fn without_export_entry_point(mut self) -> Self {
        self.export_entry_point = false;
        self
    }

    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        let count = self.memory_types.len().min(vk::MAX_MEMORY_TYPES);
        for (slot, flags) in props.memory_types.iter_mut().zip(&self.memory_types) {
            *slot = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        props.memory_type_count = count as u32;
        props.memory_heap_count = 1;
        props.memory_heaps[0] = vk::MemoryHeap {
            size: 1 << 30,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        props
    }
}

/// Queue family with `count` queues of the given capabilities.
pub fn queue_family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: count,
        ..Default::default()
    }
}

/// Mock Vulkan loader.
#[derive(Debug, Clone)]
pub struct MockLoader {
    world: MockWorld,
    layers: Vec<String>,
    instance_extensions: Vec<String>,
    devices: Arc<Vec<MockDeviceSpec>>,
}

impl MockLoader {
    /// Loader offering the validation layer and the given devices.
    pub fn new(world: &MockWorld, devices: Vec<MockDeviceSpec>) -> Self {
        Self {
            world: world.clone(),
            layers: vec![VALIDATION_LAYER.to_string()],
            instance_extensions: vec![
                "VK_KHR_external_memory_capabilities".to_string(),
                "VK_KHR_get_physical_device_properties2".to_string(),
            ],
            devices: Arc::new(devices),
        }
    }

    /// Loader with one [`MockDeviceSpec::graphics`] device.
    pub fn single(world: &MockWorld) -> Self {
        Self::new(world, vec![MockDeviceSpec::graphics("Mock GPU")])
    }

    pub fn without_layers(mut self) -> Self {
        self.layers.clear();
        self
    }
}

impl DriverLoader for MockLoader {
    fn instance_layers(&self) -> Result<Vec<String>> {
        Ok(self.layers.clone())
    }

    fn instance_extensions(&self) -> Result<Vec<String>> {
        Ok(self.instance_extensions.clone())
    }

    fn create_instance(&self, _config: &InstanceConfig) -> Result<Arc<dyn InstanceDriver>> {
        let mut state = self.world.lock();
        state.instances += 1;
        state.record(MockEvent::CreateInstance);
        Ok(Arc::new(MockInstance {
            world: self.world.clone(),
            devices: Arc::clone(&self.devices),
        }))
    }
}

/// Mock instance. Each physical device handle is its index plus one.
pub struct MockInstance {
    world: MockWorld,
    devices: Arc<Vec<MockDeviceSpec>>,
}

impl MockInstance {
    fn spec(&self, physical_device: vk::PhysicalDevice) -> Option<&MockDeviceSpec> {
        let index = usize::try_from(physical_device.as_raw()).ok()?.checked_sub(1)?;
        self.devices.get(index)
    }
}

impl Drop for MockInstance {
    fn drop(&mut self) {
        let mut state = self.world.lock();
        state.instances -= 1;
        state.record(MockEvent::DestroyInstance);
    }
}

impl InstanceDriver for MockInstance {
    fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        Ok((1..=self.devices.len() as u64)
            .map(vk::PhysicalDevice::from_raw)
            .collect())
    }

    fn properties(&self, physical_device: vk::PhysicalDevice) -> DeviceProperties {
        let spec = self.spec(physical_device);
        DeviceProperties {
            name: spec.map_or_else(String::new, |s| s.name.clone()),
            device_type: spec.map_or(vk::PhysicalDeviceType::OTHER, |s| s.device_type),
            vendor_id: spec.map_or(0, |s| s.vendor_id),
            device_id: physical_device.as_raw() as u32,
            api_version: spec.map_or(0, |s| s.api_version),
            driver_version: 1,
            max_image_dimension_2d: spec.map_or(0, |s| s.max_image_dimension_2d),
        }
    }

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.spec(physical_device)
            .map(|s| s.queue_families.clone())
            .unwrap_or_default()
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<String>> {
        Ok(self
            .spec(physical_device)
            .map(|s| s.extensions.clone())
            .unwrap_or_default())
    }

    fn memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties {
        self.spec(physical_device)
            .map(MockDeviceSpec::memory_properties)
            .unwrap_or_default()
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[String],
    ) -> Result<Arc<dyn DeviceDriver>> {
        let spec = self
            .spec(physical_device)
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED))?;
        if extensions.iter().any(|e| !spec.extensions.contains(e)) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_EXTENSION_NOT_PRESENT));
        }
        if queue_family as usize >= spec.queue_families.len() {
            return Err(GpuError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED));
        }

        let mut state = self.world.lock();
        state.devices += 1;
        state.record(MockEvent::CreateDevice);
        Ok(Arc::new(MockDevice {
            world: self.world.clone(),
            spec: spec.clone(),
        }))
    }
}

/// Mock logical device.
pub struct MockDevice {
    world: MockWorld,
    spec: MockDeviceSpec,
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let mut state = self.world.lock();
        state.devices -= 1;
        state.record(MockEvent::DestroyDevice);
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    value.div_ceil(alignment) * alignment
}

impl DeviceDriver for MockDevice {
    fn create_image(&self, desc: &ImageCreateDesc) -> Result<vk::Image> {
        let mut state = self.world.lock();
        let id = state.next_id();
        state.images.insert(
            id,
            MockImage {
                extent: desc.extent,
                format: desc.format,
                export: desc.export,
                memory: None,
            },
        );
        state.record(MockEvent::CreateImage);
        Ok(vk::Image::from_raw(id))
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let state = self.world.lock();
        let size = state
            .images
            .get(&image.as_raw())
            .map_or(0, |img| img.format.byte_size(img.extent));
        let type_bits = match self.spec.memory_types.len() {
            n if n >= 32 => u32::MAX,
            n => (1u32 << n) - 1,
        };
        vk::MemoryRequirements {
            size: align_up(size, self.spec.allocation_alignment),
            alignment: self.spec.allocation_alignment,
            memory_type_bits: type_bits,
        }
    }

    fn allocate_memory(&self, desc: &MemoryAllocateDesc) -> Result<vk::DeviceMemory> {
        if desc.memory_type_index as usize >= self.spec.memory_types.len() {
            return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        let size = usize::try_from(desc.size)
            .map_err(|_| GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))?;

        let mut state = self.world.lock();
        let block = state.new_block(size);
        let id = state.next_id();
        state.memories.insert(
            id,
            MockMemory {
                export: desc.export,
                block,
            },
        );
        state.record(MockEvent::AllocateMemory);
        Ok(vk::DeviceMemory::from_raw(id))
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<()> {
        let mut state = self.world.lock();
        if !state.memories.contains_key(&memory.as_raw()) {
            return Err(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN));
        }
        let image = state
            .images
            .get_mut(&image.as_raw())
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN))?;
        image.memory = Some(memory.as_raw());
        state.record(MockEvent::BindMemory);
        Ok(())
    }

    fn load_memory_export(&self, handle_type: HandleType) -> Result<Arc<dyn MemoryExportFns>> {
        if !self.spec.export_entry_point {
            return Err(GpuError::FunctionNotLoaded(handle_type.vulkan_entry_point()));
        }
        Ok(Arc::new(MockExport {
            world: self.world.clone(),
            handle_type,
        }))
    }

    fn upload_image(&self, target: &UploadTarget, pixels: &[u8]) -> Result<()> {
        let mut state = self.world.lock();
        let memory = state
            .images
            .get(&target.image.as_raw())
            .and_then(|img| img.memory)
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN))?;
        let block = state
            .memories
            .get(&memory)
            .map(|m| m.block)
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN))?;
        let bytes = &mut state
            .blocks
            .get_mut(&block)
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN))?
            .bytes;
        if pixels.len() > bytes.len() {
            return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        bytes[..pixels.len()].copy_from_slice(pixels);
        state.record(MockEvent::Upload);
        Ok(())
    }

    fn destroy_image(&self, image: vk::Image) {
        let mut state = self.world.lock();
        if state.images.remove(&image.as_raw()).is_some() {
            state.record(MockEvent::DestroyImage);
        }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.world.lock();
        if let Some(mem) = state.memories.remove(&memory.as_raw()) {
            state.release_block(mem.block);
            state.record(MockEvent::FreeMemory);
        }
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}

/// Mock export entry point.
///
/// Opaque fds are real descriptors (one end of a socket pair) so ownership
/// transfer and closing behave as they do with a driver.
pub struct MockExport {
    world: MockWorld,
    handle_type: HandleType,
}

impl MemoryExportFns for MockExport {
    fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    #[cfg(unix)]
    fn export(&self, memory: vk::DeviceMemory) -> Result<NativeMemoryHandle> {
        use std::os::fd::{AsRawFd, OwnedFd};
        use std::os::unix::net::UnixStream;

        use super::world::ExportedFd;

        let mut state = self.world.lock();
        let mem = state
            .memories
            .get(&memory.as_raw())
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_INVALID_EXTERNAL_HANDLE))?;
        if mem.export != Some(self.handle_type) || self.handle_type != HandleType::OpaqueFd {
            return Err(GpuError::Vulkan(vk::Result::ERROR_INVALID_EXTERNAL_HANDLE));
        }
        let block = mem.block;

        let (handle_end, peer) = UnixStream::pair().map_err(vkgl_core::Error::from)?;
        peer.set_nonblocking(true).map_err(vkgl_core::Error::from)?;
        let fd = OwnedFd::from(handle_end);
        state.prune_exports();
        state
            .exported_fds
            .insert(fd.as_raw_fd(), ExportedFd { block, peer });
        state.record(MockEvent::ExportHandle);
        Ok(NativeMemoryHandle::from_fd(self.handle_type, fd))
    }

    #[cfg(not(unix))]
    fn export(&self, _memory: vk::DeviceMemory) -> Result<NativeMemoryHandle> {
        Err(GpuError::FunctionNotLoaded(self.handle_type.vulkan_entry_point()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements_are_aligned() {
        assert_eq!(align_up(65_536, 4096), 65_536);
        assert_eq!(align_up(4 * 300 * 17, 4096), 24_576);
        assert_eq!(align_up(5, 0), 5);
    }

    #[test]
    fn memory_types_are_reported_in_order() {
        let props = MockDeviceSpec::graphics("gpu").memory_properties();
        assert_eq!(props.memory_type_count, 2);
        assert!(props.memory_types[0]
            .property_flags
            .contains(vk::MemoryPropertyFlags::DEVICE_LOCAL));
    }
}

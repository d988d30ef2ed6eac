//! Logical device backed by `ash`.

use std::ffi::{c_char, CString};
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use vkgl_core::HandleType;

use super::export::{AshFdExport, AshWin32Export};
use super::staging::{StagingAllocator, StagingBuffer};
use super::submit::{acquire_for_transfer, release_after_transfer, OneShot};
use super::to_cstrings;
use crate::convert::{vk_format, vk_handle_type};
use crate::driver::{DeviceDriver, ImageCreateDesc, MemoryAllocateDesc, MemoryExportFns, UploadTarget};
use crate::error::{GpuError, Result};

/// Logical device with one graphics queue.
pub struct AshDevice {
    instance: ash::Instance,
    device: Arc<ash::Device>,
    queue: vk::Queue,
    queue_family: u32,
    staging: Mutex<StagingAllocator>,
}

impl AshDevice {
    /// Create the logical device and its staging allocator.
    ///
    /// # Safety
    /// The instance and physical device must be valid and outlive the device.
    pub unsafe fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[String],
    ) -> Result<Self> {
        let queue_priority = 1.0_f32;
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(std::slice::from_ref(&queue_priority));

        let extensions = to_cstrings(extensions)?;
        let extension_names: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extension_names);

        let device = unsafe {
            instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(GpuError::from)?
        };
        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        let device = Arc::new(device);

        let allocator = match unsafe { StagingAllocator::new(instance, device.clone(), physical_device) } {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        Ok(Self {
            instance: instance.clone(),
            device,
            queue,
            queue_family,
            staging: Mutex::new(allocator),
        })
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the graphics queue.
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    fn entry_point_resolves(&self, name: &str) -> bool {
        let Ok(name) = CString::new(name) else {
            return false;
        };
        let pfn = unsafe {
            self.instance
                .get_device_proc_addr(self.device.handle(), name.as_ptr())
        };
        pfn.is_some()
    }

    unsafe fn record_upload(&self, target: &UploadTarget, staging: &StagingBuffer) -> Result<()> {
        let one_shot = unsafe { OneShot::begin(&self.device, self.queue_family)? };
        let cmd = one_shot.cmd();

        let region = vk::BufferImageCopy::default()
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .layer_count(1),
            )
            .image_extent(vk::Extent3D {
                width: target.extent.width,
                height: target.extent.height,
                depth: 1,
            });

        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[acquire_for_transfer(target.image)],
            );
            self.device.cmd_copy_buffer_to_image(
                cmd,
                staging.buffer,
                target.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
            self.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[release_after_transfer(
                    target.image,
                    self.queue_family,
                    target.release_to_external,
                )],
            );
            one_shot.submit_and_wait(self.queue)
        }
    }
}

impl DeviceDriver for AshDevice {
    fn create_image(&self, desc: &ImageCreateDesc) -> Result<vk::Image> {
        let mut external = vk::ExternalMemoryImageCreateInfo::default()
            .handle_types(desc.export.map(vk_handle_type).unwrap_or_default());

        let mut create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk_format(desc.format))
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        if desc.export.is_some() {
            create_info = create_info.push_next(&mut external);
        }

        let image = unsafe { self.device.create_image(&create_info, None)? };
        Ok(image)
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn allocate_memory(&self, desc: &MemoryAllocateDesc) -> Result<vk::DeviceMemory> {
        let mut export = vk::ExportMemoryAllocateInfo::default()
            .handle_types(desc.export.map(vk_handle_type).unwrap_or_default());
        let mut dedicated =
            vk::MemoryDedicatedAllocateInfo::default().image(desc.dedicated_image.unwrap_or_default());

        let mut allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(desc.size)
            .memory_type_index(desc.memory_type_index);
        if desc.export.is_some() {
            allocate_info = allocate_info.push_next(&mut export);
        }
        if desc.dedicated_image.is_some() {
            allocate_info = allocate_info.push_next(&mut dedicated);
        }

        let memory = unsafe { self.device.allocate_memory(&allocate_info, None)? };
        Ok(memory)
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<()> {
        unsafe { self.device.bind_image_memory(image, memory, 0)? };
        Ok(())
    }

    fn load_memory_export(&self, handle_type: HandleType) -> Result<Arc<dyn MemoryExportFns>> {
        let entry_point = handle_type.vulkan_entry_point();
        if !handle_type.is_native() || !self.entry_point_resolves(entry_point) {
            return Err(GpuError::FunctionNotLoaded(entry_point));
        }

        let fns: Arc<dyn MemoryExportFns> = match handle_type {
            HandleType::OpaqueFd => Arc::new(AshFdExport::new(&self.instance, &self.device)),
            HandleType::OpaqueWin32 | HandleType::OpaqueWin32Kmt => Arc::new(
                AshWin32Export::new(&self.instance, &self.device, handle_type),
            ),
        };
        Ok(fns)
    }

    fn upload_image(&self, target: &UploadTarget, pixels: &[u8]) -> Result<()> {
        let staged = self.staging.lock().stage(pixels)?;
        tracing::trace!("Staged {} bytes for image {:?}", staged.len(), target.image);

        let result = unsafe { self.record_upload(target, &staged) };
        self.staging.lock().release(staged);
        result
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) };
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) };
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for AshDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Staging memory must be released before the device
            self.staging.lock().shutdown();

            self.device.destroy_device(None);
        }
    }
}

//! Host-visible staging memory for image fills.
//!
//! Exportable memory needs export and dedicated-allocation structures chained
//! into `vkAllocateMemory`, so it is allocated directly. Staging buffers are
//! plain sub-allocations and go through gpu-allocator.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;

use crate::error::{GpuError, Result};

/// Transfer-source buffer holding one fill's pixels.
pub struct StagingBuffer {
    pub buffer: vk::Buffer,
    allocation: Option<Allocation>,
    len: u64,
}

impl StagingBuffer {
    /// Number of bytes staged.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Sub-allocates staging buffers from `CpuToGpu` memory.
pub struct StagingAllocator {
    allocator: Option<Allocator>,
    device: Arc<ash::Device>,
}

impl StagingAllocator {
    /// # Safety
    /// The instance, device and physical device must be valid and outlive
    /// the allocator.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: (*device).clone(),
            physical_device,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_leaks_on_shutdown: true,
                ..Default::default()
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;

        Ok(Self {
            allocator: Some(allocator),
            device,
        })
    }

    /// Create a mapped buffer and copy `pixels` into it.
    pub fn stage(&mut self, pixels: &[u8]) -> Result<StagingBuffer> {
        let len = pixels.len() as u64;
        let create_info = vk::BufferCreateInfo::default()
            .size(len)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&create_info, None)? };

        let mut staged = StagingBuffer {
            buffer,
            allocation: None,
            len,
        };
        match self.back_and_copy(&mut staged, pixels) {
            Ok(()) => Ok(staged),
            Err(e) => {
                self.release(staged);
                Err(e)
            }
        }
    }

    fn back_and_copy(&mut self, staged: &mut StagingBuffer, pixels: &[u8]) -> Result<()> {
        let requirements = unsafe { self.device.get_buffer_memory_requirements(staged.buffer) };
        let allocator = self
            .allocator
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState("Staging allocator shut down".to_string()))?;

        let allocation = allocator
            .allocate(&AllocationCreateDesc {
                name: "vkgl fill staging",
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;
        // SAFETY: the memory handle is only used to bind this buffer, and the
        // allocation outlives the binding.
        let memory = unsafe { allocation.memory() };
        let offset = allocation.offset();
        let mapped = allocation.mapped_ptr();
        staged.allocation = Some(allocation);

        unsafe { self.device.bind_buffer_memory(staged.buffer, memory, offset)? };

        let dst = mapped
            .ok_or_else(|| GpuError::InvalidState("Staging memory is not mapped".to_string()))?;
        // SAFETY: the allocation is at least `requirements.size >= pixels.len()`
        // bytes and stays mapped while it is alive.
        unsafe {
            std::ptr::copy_nonoverlapping(
                pixels.as_ptr(),
                dst.as_ptr().cast::<u8>(),
                pixels.len(),
            );
        }
        Ok(())
    }

    /// Destroy the buffer and return its memory to the allocator.
    pub fn release(&mut self, mut staged: StagingBuffer) {
        if let (Some(allocation), Some(allocator)) =
            (staged.allocation.take(), self.allocator.as_mut())
        {
            if let Err(e) = allocator.free(allocation) {
                tracing::warn!("Failed to free staging allocation: {e}");
            }
        }
        unsafe { self.device.destroy_buffer(staged.buffer, None) };
    }

    /// Drop the allocator. Must run before the device is destroyed.
    pub fn shutdown(&mut self) {
        self.allocator.take();
    }
}

impl Drop for StagingAllocator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

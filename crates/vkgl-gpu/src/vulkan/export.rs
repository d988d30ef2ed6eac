//! Export entry points for the platform handle types.

use ash::vk;
use vkgl_core::{HandleType, NativeMemoryHandle};

use crate::convert::vk_handle_type;
use crate::driver::MemoryExportFns;
use crate::error::{GpuError, Result};

/// `vkGetMemoryFdKHR`
pub struct AshFdExport {
    fns: ash::khr::external_memory_fd::Device,
}

impl AshFdExport {
    pub fn new(instance: &ash::Instance, device: &ash::Device) -> Self {
        Self {
            fns: ash::khr::external_memory_fd::Device::new(instance, device),
        }
    }
}

impl MemoryExportFns for AshFdExport {
    fn handle_type(&self) -> HandleType {
        HandleType::OpaqueFd
    }

    #[cfg(unix)]
    fn export(&self, memory: vk::DeviceMemory) -> Result<NativeMemoryHandle> {
        use std::os::fd::{FromRawFd, OwnedFd};

        let info = vk::MemoryGetFdInfoKHR::default()
            .memory(memory)
            .handle_type(vk_handle_type(HandleType::OpaqueFd));
        let fd = unsafe { self.fns.get_memory_fd(&info)? };
        if fd < 0 {
            return Err(GpuError::ResourceCreation(format!(
                "vkGetMemoryFdKHR returned invalid fd {fd}"
            )));
        }
        // SAFETY: a successful export hands us a new descriptor we own.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(NativeMemoryHandle::from_fd(HandleType::OpaqueFd, fd))
    }

    #[cfg(not(unix))]
    fn export(&self, _memory: vk::DeviceMemory) -> Result<NativeMemoryHandle> {
        Err(GpuError::FunctionNotLoaded(
            HandleType::OpaqueFd.vulkan_entry_point(),
        ))
    }
}

/// `vkGetMemoryWin32HandleKHR`
pub struct AshWin32Export {
    fns: ash::khr::external_memory_win32::Device,
    handle_type: HandleType,
}

impl AshWin32Export {
    pub fn new(instance: &ash::Instance, device: &ash::Device, handle_type: HandleType) -> Self {
        Self {
            fns: ash::khr::external_memory_win32::Device::new(instance, device),
            handle_type,
        }
    }
}

impl MemoryExportFns for AshWin32Export {
    fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    fn export(&self, memory: vk::DeviceMemory) -> Result<NativeMemoryHandle> {
        let info = vk::MemoryGetWin32HandleInfoKHR::default()
            .memory(memory)
            .handle_type(vk_handle_type(self.handle_type));
        let handle = unsafe { self.fns.get_memory_win32_handle(&info)? };
        let raw = handle as isize;
        if raw == 0 {
            return Err(GpuError::ResourceCreation(
                "vkGetMemoryWin32HandleKHR returned a null handle".to_string(),
            ));
        }
        // SAFETY: a successful export hands us a new handle we own.
        Ok(unsafe { NativeMemoryHandle::from_raw_win32(self.handle_type, raw) })
    }
}

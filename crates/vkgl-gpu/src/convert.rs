//! Mapping shared vocabulary onto Vulkan enums.

use ash::vk;
use vkgl_core::{HandleType, PixelFormat};

/// `VkFormat` for a pixel format.
pub const fn vk_format(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
    }
}

/// External memory handle type flag for a handle type.
pub const fn vk_handle_type(handle_type: HandleType) -> vk::ExternalMemoryHandleTypeFlags {
    match handle_type {
        HandleType::OpaqueFd => vk::ExternalMemoryHandleTypeFlags::OPAQUE_FD,
        HandleType::OpaqueWin32 => vk::ExternalMemoryHandleTypeFlags::OPAQUE_WIN32,
        HandleType::OpaqueWin32Kmt => vk::ExternalMemoryHandleTypeFlags::OPAQUE_WIN32_KMT,
    }
}

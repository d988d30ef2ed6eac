//! Exportable image creation.

use ash::vk;
use vkgl_core::{Extent2D, HandleType, PixelFormat};

use crate::context::LogicalDevice;
use crate::driver::ImageCreateDesc;
use crate::error::{GpuError, Result};

/// Usage of the shared image: rendered to, copied from or into, and sampled
/// by the importing API.
pub const DEFAULT_IMAGE_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw()
        | vk::ImageUsageFlags::SAMPLED.as_raw()
        | vk::ImageUsageFlags::TRANSFER_SRC.as_raw()
        | vk::ImageUsageFlags::TRANSFER_DST.as_raw(),
);

/// Parameters for [`create_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub usage: vk::ImageUsageFlags,
    /// Declare the image exportable through this handle type.
    pub export_handle_type: Option<HandleType>,
}

impl ImageDesc {
    /// Exportable RGBA8 image with the default usage.
    pub fn exportable(extent: Extent2D, handle_type: HandleType) -> Self {
        Self {
            extent,
            format: PixelFormat::Rgba8Unorm,
            usage: DEFAULT_IMAGE_USAGE,
            export_handle_type: Some(handle_type),
        }
    }

    /// Set the pixel format.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }
}

/// A 2D image with no memory bound yet. Destroyed on drop.
pub struct Image {
    device: LogicalDevice,
    raw: vk::Image,
    desc: ImageDesc,
    requirements: vk::MemoryRequirements,
}

impl Image {
    /// Get the raw image handle.
    pub fn raw(&self) -> vk::Image {
        self.raw
    }

    /// Get the creation parameters.
    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    /// Memory requirements queried right after creation.
    pub fn requirements(&self) -> vk::MemoryRequirements {
        self.requirements
    }

    /// Get the device this image belongs to.
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        tracing::debug!("Destroying image {:?}", self.raw);
        self.device.driver().destroy_image(self.raw);
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("raw", &self.raw)
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

/// Create a 2D, single-mip, optimally tiled image in the undefined layout.
pub fn create_image(device: &LogicalDevice, desc: &ImageDesc) -> Result<Image> {
    if desc.extent.is_empty() {
        return Err(GpuError::ResourceCreation(format!(
            "Image extent {} has a zero dimension",
            desc.extent
        )));
    }

    let max = device.physical_device().max_image_dimension_2d;
    if desc.extent.width > max || desc.extent.height > max {
        return Err(GpuError::ResourceCreation(format!(
            "Image extent {} exceeds device limit {max}",
            desc.extent
        )));
    }

    if let Some(handle_type) = desc.export_handle_type {
        if !device.is_extension_enabled(handle_type.vulkan_extension()) {
            return Err(GpuError::ExtensionNotSupported(
                handle_type.vulkan_extension().to_string(),
            ));
        }
    }

    let raw = device.driver().create_image(&ImageCreateDesc {
        extent: desc.extent,
        format: desc.format,
        usage: desc.usage,
        export: desc.export_handle_type,
    })?;
    let requirements = device.driver().image_memory_requirements(raw);
    tracing::debug!(
        "Created {} {} image {raw:?} ({} bytes required)",
        desc.extent,
        desc.format,
        requirements.size
    );

    Ok(Image {
        device: device.clone(),
        raw,
        desc: *desc,
        requirements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exportable_images_can_be_sampled_and_filled() {
        let desc = ImageDesc::exportable(Extent2D::square(4), HandleType::OpaqueFd);
        assert!(desc.usage.contains(
            vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::COLOR_ATTACHMENT
        ));
        assert_eq!(desc.format, PixelFormat::Rgba8Unorm);
        assert_eq!(desc.export_handle_type, Some(HandleType::OpaqueFd));
    }
}

//! Exportable device memory and image binding.

use ash::vk;
use vkgl_core::{HandleType, ImportDesc};

use crate::context::LogicalDevice;
use crate::driver::MemoryAllocateDesc;
use crate::error::{GpuError, Result};
use crate::image::Image;

/// First memory type allowed by `type_bits` that has every `required` flag.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(i, ty)| type_bits & (1 << i) != 0 && ty.property_flags.contains(required))
        .and_then(|(i, _)| u32::try_from(i).ok())
}

/// Device memory dedicated to one image, optionally declared exportable.
///
/// Freed on drop.
pub struct ExportableAllocation {
    device: LogicalDevice,
    memory: vk::DeviceMemory,
    size: u64,
    memory_type_index: u32,
    handle_type: Option<HandleType>,
    dedicated_to: vk::Image,
}

impl ExportableAllocation {
    /// Get the raw memory handle.
    pub fn raw(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Allocation size as reported by the memory requirements query.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Index of the memory type the allocation came from.
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Handle type declared at allocation, if any.
    pub fn handle_type(&self) -> Option<HandleType> {
        self.handle_type
    }
}

impl Drop for ExportableAllocation {
    fn drop(&mut self) {
        tracing::debug!("Freeing memory {:?}", self.memory);
        self.device.driver().free_memory(self.memory);
    }
}

impl std::fmt::Debug for ExportableAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportableAllocation")
            .field("memory", &self.memory)
            .field("size", &self.size)
            .field("memory_type_index", &self.memory_type_index)
            .field("handle_type", &self.handle_type)
            .finish_non_exhaustive()
    }
}

fn allocate(
    device: &LogicalDevice,
    image: &Image,
    export: Option<HandleType>,
) -> Result<ExportableAllocation> {
    let requirements = image.requirements();
    let required = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    let memory_type_index =
        find_memory_type(&device.memory_properties(), requirements.memory_type_bits, required)
            .ok_or(GpuError::NoSuitableMemoryType {
                type_bits: requirements.memory_type_bits,
                required,
            })?;

    let memory = device.driver().allocate_memory(&MemoryAllocateDesc {
        size: requirements.size,
        memory_type_index,
        export,
        dedicated_image: Some(image.raw()),
    })?;
    tracing::debug!(
        "Allocated {} bytes from memory type {memory_type_index} for image {:?} (export: {export:?})",
        requirements.size,
        image.raw()
    );

    Ok(ExportableAllocation {
        device: device.clone(),
        memory,
        size: requirements.size,
        memory_type_index,
        handle_type: export,
        dedicated_to: image.raw(),
    })
}

/// Allocate dedicated device-local memory for `image`, declared exportable.
///
/// The image must have been created with the same export handle type.
pub fn allocate_exportable_memory(
    device: &LogicalDevice,
    image: &Image,
    handle_type: HandleType,
) -> Result<ExportableAllocation> {
    if image.desc().export_handle_type != Some(handle_type) {
        return Err(GpuError::ExportImportMismatch(format!(
            "Allocation declares {handle_type} but image declares {:?}",
            image.desc().export_handle_type
        )));
    }
    allocate(device, image, Some(handle_type))
}

/// Allocate dedicated device-local memory for `image` with no export declaration.
pub fn allocate_device_memory(device: &LogicalDevice, image: &Image) -> Result<ExportableAllocation> {
    allocate(device, image, None)
}

/// An image with its dedicated allocation bound at offset 0.
///
/// Field order gives the teardown order: image first, then memory.
pub struct BoundImage {
    image: Image,
    allocation: ExportableAllocation,
}

impl BoundImage {
    /// Get the image.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Get the allocation.
    pub fn allocation(&self) -> &ExportableAllocation {
        &self.allocation
    }

    /// Description an importer needs to reproduce this image.
    ///
    /// Fails if the allocation was not declared exportable.
    pub fn import_desc(&self) -> Result<ImportDesc> {
        let handle_type = self.allocation.handle_type.ok_or_else(|| {
            GpuError::ExportImportMismatch("Allocation was not declared exportable".to_string())
        })?;
        Ok(ImportDesc {
            extent: self.image.desc().extent,
            format: self.image.desc().format,
            allocation_size: self.allocation.size,
            handle_type,
        })
    }
}

impl std::fmt::Debug for BoundImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundImage")
            .field("image", &self.image)
            .field("allocation", &self.allocation)
            .finish()
    }
}

fn check_binding(image: &Image, allocation: &ExportableAllocation) -> Result<()> {
    if allocation.dedicated_to != image.raw() {
        return Err(GpuError::ExportImportMismatch(format!(
            "Allocation {:?} is dedicated to image {:?}, not {:?}",
            allocation.memory,
            allocation.dedicated_to,
            image.raw()
        )));
    }
    if allocation.handle_type != image.desc().export_handle_type {
        return Err(GpuError::ExportImportMismatch(format!(
            "Image declares {:?} but allocation declares {:?}",
            image.desc().export_handle_type,
            allocation.handle_type
        )));
    }
    Ok(())
}

/// Bind `allocation` to `image` at offset 0.
///
/// Both objects are released, image first, if binding fails.
pub fn bind(
    device: &LogicalDevice,
    image: Image,
    allocation: ExportableAllocation,
) -> Result<BoundImage> {
    let result = check_binding(&image, &allocation).and_then(|()| {
        device
            .driver()
            .bind_image_memory(image.raw(), allocation.raw())
    });

    match result {
        Ok(()) => {
            tracing::debug!("Bound memory {:?} to image {:?}", allocation.raw(), image.raw());
            Ok(BoundImage { image, allocation })
        }
        Err(e) => {
            drop(image);
            drop(allocation);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = *f;
        }
        props
    }

    #[test]
    fn first_matching_type_wins() {
        let props = properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(1)
        );
        assert_eq!(
            find_memory_type(&props, 0b100, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(2)
        );
    }

    #[test]
    fn no_match_when_mask_excludes_candidates() {
        let props = properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);
        assert_eq!(
            find_memory_type(&props, 0b01, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            None
        );
        assert_eq!(
            find_memory_type(&props, 0, vk::MemoryPropertyFlags::empty()),
            None
        );
    }

    #[test]
    fn memory_type_count_bounds_the_search() {
        let mut props = properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        assert_eq!(
            find_memory_type(&props, u32::MAX, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            None
        );
    }
}

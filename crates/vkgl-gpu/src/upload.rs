//! Host writes into a bound image.

use crate::context::LogicalDevice;
use crate::driver::UploadTarget;
use crate::error::{GpuError, Result};
use crate::memory::BoundImage;

/// Copy tightly packed `pixels` into `bound`.
///
/// Blocks on a fence until the copy has completed, and leaves the image in
/// `GENERAL` layout released to the external queue family, so the memory
/// may be read through another API as soon as this returns.
pub fn fill_image(device: &LogicalDevice, bound: &BoundImage, pixels: &[u8]) -> Result<()> {
    let desc = bound.image().desc();
    let expected = desc.format.byte_size(desc.extent);
    if pixels.len() as u64 != expected {
        return Err(GpuError::ResourceCreation(format!(
            "Fill data is {} bytes, {} {} image needs {expected}",
            pixels.len(),
            desc.extent,
            desc.format
        )));
    }

    device.driver().upload_image(
        &UploadTarget {
            image: bound.image().raw(),
            extent: desc.extent,
            format: desc.format,
            release_to_external: desc.export_handle_type.is_some(),
        },
        pixels,
    )?;
    tracing::debug!("Filled image {:?} with {expected} bytes", bound.image().raw());
    Ok(())
}

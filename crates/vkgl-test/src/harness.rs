//! Fixtures for driving full chains against the mocks or a real GPU.

use std::rc::Rc;

use image::{ImageBuffer, Rgba};
use vkgl_core::{Extent2D, HandleType, NativeMemoryHandle, Pattern};
use vkgl_gl::TextureImporter;
use vkgl_gpu::{
    allocate_exportable_memory, bind, create_image, fill_image, BoundImage, GpuContext,
    GpuContextBuilder, HandleExporter, ImageDesc,
};
use vkgl_interop::{ChainDesc, InteropChain, InteropError};

use crate::mock::{MockDeviceSpec, MockGl, MockLoader, MockWorld};
use crate::{Result, TestError};

/// Tightly packed RGBA8 image.
pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// A GPU context, exporter and importer wired to the mocks.
///
/// Uses opaque fds, one graphics device unless told otherwise, and no
/// validation layer.
pub struct MockHarness {
    pub world: MockWorld,
    pub gl: Rc<MockGl>,
    pub gpu: GpuContext,
    pub exporter: HandleExporter,
    pub importer: TextureImporter,
}

impl MockHarness {
    /// Harness over a single [`MockDeviceSpec::graphics`] device.
    pub fn new() -> Result<Self> {
        Self::with_devices(vec![MockDeviceSpec::graphics("Mock GPU")])
    }

    /// Harness over the given devices; the first one is selected.
    pub fn with_devices(devices: Vec<MockDeviceSpec>) -> Result<Self> {
        let world = MockWorld::new();
        let loader = MockLoader::new(&world, devices);
        let gpu = GpuContextBuilder::new()
            .app_name("vkgl-test")
            .validation(false)
            .handle_type(HandleType::OpaqueFd)
            .build_with(&loader)
            .map_err(InteropError::from)?;

        let mut exporter = HandleExporter::new(HandleType::OpaqueFd);
        exporter.load(&gpu.device).map_err(InteropError::from)?;

        let gl = Rc::new(MockGl::new(&world));
        let importer = TextureImporter::new(gl.clone());
        tracing::debug!("Mock harness ready on {}", gpu.physical_device.summary());

        Ok(Self {
            world,
            gl,
            gpu,
            exporter,
            importer,
        })
    }

    /// Chain description for an RGBA8 image shared through an opaque fd.
    pub fn chain_desc(&self, extent: Extent2D) -> ChainDesc {
        ChainDesc::new(extent, HandleType::OpaqueFd)
    }

    pub fn build_chain(&self, desc: &ChainDesc) -> vkgl_interop::Result<InteropChain> {
        InteropChain::build(&self.gpu.device, &self.exporter, &self.importer, desc)
    }
}

/// Vulkan-only export on the system's GPU.
pub struct HeadlessExport {
    gpu: GpuContext,
    exporter: HandleExporter,
}

impl HeadlessExport {
    /// Create a context on the first GPU with the platform's handle type.
    pub fn new() -> Result<Self> {
        let gpu = GpuContextBuilder::new()
            .app_name("vkgl-test")
            .validation(false)
            .build()
            .map_err(|e| TestError::Gpu(e.to_string()))?;

        let mut exporter = HandleExporter::new(gpu.handle_type);
        exporter
            .load(&gpu.device)
            .map_err(|e| TestError::Gpu(e.to_string()))?;

        Ok(Self { gpu, exporter })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Create, bind, fill with `pattern` and export one image.
    pub fn export(
        &self,
        extent: Extent2D,
        pattern: Pattern,
    ) -> Result<(BoundImage, NativeMemoryHandle)> {
        let run = || -> vkgl_gpu::Result<(BoundImage, NativeMemoryHandle)> {
            let device = &self.gpu.device;
            let image = create_image(device, &ImageDesc::exportable(extent, self.gpu.handle_type))?;
            let allocation = allocate_exportable_memory(device, &image, self.gpu.handle_type)?;
            let bound = bind(device, image, allocation)?;
            if let Some(pixels) = pattern.generate(extent) {
                fill_image(device, &bound, &pixels)?;
            }
            let handle = self.exporter.export_handle(&bound)?;
            Ok((bound, handle))
        };
        run().map_err(|e| TestError::Gpu(e.to_string()))
    }
}

/// Wrap tightly packed RGBA8 bytes as an image.
pub fn to_image(extent: Extent2D, pixels: Vec<u8>) -> Result<RgbaImage> {
    ImageBuffer::from_raw(extent.width, extent.height, pixels).ok_or_else(|| {
        TestError::ImageComparison(format!("Pixel data does not match a {extent} RGBA8 image"))
    })
}

/// Normalized difference (0.0-1.0) between two images over all four channels.
pub fn compare_images(a: &RgbaImage, b: &RgbaImage) -> Result<f64> {
    if a.dimensions() != b.dimensions() {
        return Err(TestError::ImageComparison(format!(
            "Image dimensions don't match: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }

    let total_diff: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| {
            pa.0.iter()
                .zip(pb.0.iter())
                .map(|(ca, cb)| u64::from(ca.abs_diff(*cb)))
                .sum::<u64>()
        })
        .sum();

    let max_diff = (u64::from(a.width()) * u64::from(a.height()) * 4 * 255).max(1) as f64;
    Ok(total_diff as f64 / max_diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_images_have_no_difference() {
        let extent = Extent2D::square(8);
        let a = to_image(extent, Pattern::Gradient.generate(extent).unwrap()).unwrap();
        assert_eq!(compare_images(&a, &a.clone()).unwrap(), 0.0);
    }

    #[test]
    fn inverted_image_is_fully_different() {
        let a = to_image(Extent2D::square(2), vec![0; 16]).unwrap();
        let b = to_image(Extent2D::square(2), vec![255; 16]).unwrap();
        assert!((compare_images(&a, &b).unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_pixel_data_is_rejected() {
        assert!(to_image(Extent2D::square(4), vec![0; 12]).is_err());
    }

    // These tests require a GPU and will be skipped in CI without GPU support

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn headless_context_creation() {
        let headless = HeadlessExport::new().unwrap();
        assert!(headless
            .gpu()
            .physical_device
            .has_extension(headless.gpu().handle_type.vulkan_extension()));
    }

    #[test]
    #[ignore = "Requires GPU hardware"]
    fn export_128_square_image() {
        let headless = HeadlessExport::new().unwrap();
        let (bound, handle) = headless
            .export(Extent2D::square(128), Pattern::Solid)
            .unwrap();
        let desc = bound.import_desc().unwrap();
        assert!(desc.size_is_sufficient());
        assert!(handle.raw().is_ok());
    }
}

//! One Vulkan image shared with GL, from creation to teardown.

use vkgl_core::{Extent2D, HandleType, ImportDesc, NativeMemoryHandle, Pattern, PixelFormat, ResourceState};
use vkgl_gl::{ImportedTexture, TextureImporter};
use vkgl_gpu::{
    allocate_exportable_memory, bind, create_image, fill_image, BoundImage, GpuError,
    HandleExporter, ImageDesc, LogicalDevice,
};

use crate::error::Result;

/// Contents written through Vulkan before the import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InitialFill {
    /// Leave whatever the driver provides.
    #[default]
    None,
    /// Generated once the image has been created, so the extent is known to
    /// be within device limits.
    Pattern(Pattern),
    /// Explicit texels in the chain format's byte order.
    Pixels(Vec<u8>),
}

impl InitialFill {
    /// Texels for an image of `extent` and `format`, or `None` to skip the fill.
    pub fn pixels(&self, extent: Extent2D, format: PixelFormat) -> Option<Vec<u8>> {
        match self {
            Self::None => None,
            Self::Pattern(pattern) => pattern.generate(extent).map(|px| format.reorder_rgba8(px)),
            Self::Pixels(pixels) => Some(pixels.clone()),
        }
    }
}

/// Parameters for [`InteropChain::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDesc {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub handle_type: HandleType,
    pub fill: InitialFill,
}

impl ChainDesc {
    /// RGBA8 chain with no initial fill.
    pub fn new(extent: Extent2D, handle_type: HandleType) -> Self {
        Self {
            extent,
            format: PixelFormat::Rgba8Unorm,
            handle_type,
            fill: InitialFill::None,
        }
    }

    /// Set the pixel format.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Fill with explicit pixels.
    pub fn with_fill(mut self, pixels: Vec<u8>) -> Self {
        self.fill = InitialFill::Pixels(pixels);
        self
    }

    /// Fill with a generated pattern.
    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.fill = InitialFill::Pattern(pattern);
        self
    }
}

/// A Vulkan image exported into a GL texture.
///
/// Owns every object of the chain and releases them in a fixed order: GL
/// texture, GL memory object, native handle, Vulkan image, Vulkan memory.
/// The device and instance go last, when their reference counts drop to zero.
pub struct InteropChain {
    texture: Option<ImportedTexture>,
    handle: Option<NativeMemoryHandle>,
    bound: Option<BoundImage>,
    import_desc: Option<ImportDesc>,
    state: ResourceState,
    device: LogicalDevice,
    importer: TextureImporter,
}

impl InteropChain {
    /// Create, bind, export, optionally fill, and import one image.
    ///
    /// On failure everything created so far is released before returning.
    pub fn build(
        device: &LogicalDevice,
        exporter: &HandleExporter,
        importer: &TextureImporter,
        desc: &ChainDesc,
    ) -> Result<Self> {
        let mut chain = Self {
            texture: None,
            handle: None,
            bound: None,
            import_desc: None,
            state: ResourceState::Uninitialized,
            device: device.clone(),
            importer: importer.clone(),
        };

        match chain.run(exporter, desc) {
            Ok(()) => {
                tracing::info!(
                    "Shared {} {} image as GL texture {}",
                    desc.extent,
                    desc.format,
                    chain.texture_id().unwrap_or_default()
                );
                Ok(chain)
            }
            Err(e) => {
                tracing::error!("Interop chain failed at {:?}: {e}", chain.state);
                chain.destroy();
                Err(e)
            }
        }
    }

    fn run(&mut self, exporter: &HandleExporter, desc: &ChainDesc) -> Result<()> {
        if exporter.handle_type() != desc.handle_type {
            return Err(GpuError::ExportImportMismatch(format!(
                "Exporter produces {} but chain requests {}",
                exporter.handle_type(),
                desc.handle_type
            ))
            .into());
        }

        let image_desc = ImageDesc::exportable(desc.extent, desc.handle_type).with_format(desc.format);
        let image = create_image(&self.device, &image_desc)?;
        self.state.advance(ResourceState::ImageCreated)?;

        let allocation = allocate_exportable_memory(&self.device, &image, desc.handle_type)?;
        self.state.advance(ResourceState::MemoryAllocated)?;

        let bound = self.bound.insert(bind(&self.device, image, allocation)?);
        self.state.advance(ResourceState::Bound)?;

        self.handle = Some(exporter.export_handle(bound)?);
        self.state.advance(ResourceState::Exported)?;

        if let Some(pixels) = desc.fill.pixels(desc.extent, desc.format) {
            fill_image(&self.device, bound, &pixels)?;
        }

        let import_desc = bound.import_desc()?;
        self.import_desc = Some(import_desc);

        let placeholder = self
            .importer
            .create_texture_placeholder(import_desc.extent, import_desc.format)?;
        let handle = self.handle.take().ok_or_else(|| {
            GpuError::InvalidState("Exported handle missing before import".to_string())
        })?;
        self.texture = Some(self.importer.import(placeholder, handle, &import_desc)?);
        self.state.advance(ResourceState::Imported)?;

        Ok(())
    }

    /// Current lifecycle stage.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// GL texture name once imported.
    pub fn texture_id(&self) -> Option<u32> {
        self.texture.as_ref().map(ImportedTexture::id)
    }

    /// Description handed to the importer.
    pub fn import_desc(&self) -> Option<&ImportDesc> {
        self.import_desc.as_ref()
    }

    /// Get the bound Vulkan image.
    pub fn bound_image(&self) -> Option<&BoundImage> {
        self.bound.as_ref()
    }

    /// Record that the texture was drawn this frame.
    pub fn mark_displayed(&mut self) -> Result<()> {
        self.state.advance(ResourceState::Displayed)?;
        Ok(())
    }

    /// Overwrite the image with `pattern`, converted to the chain's format.
    pub fn fill_pattern(&mut self, pattern: Pattern) -> Result<()> {
        let Some(desc) = self.import_desc else {
            return Err(GpuError::InvalidState(format!("Cannot fill in state {:?}", self.state)).into());
        };
        match InitialFill::Pattern(pattern).pixels(desc.extent, desc.format) {
            Some(pixels) => self.fill(&pixels),
            None => Ok(()),
        }
    }

    /// Overwrite the image through Vulkan. Returns once the write is visible to GL.
    ///
    /// `pixels` are in the chain format's byte order.
    pub fn fill(&mut self, pixels: &[u8]) -> Result<()> {
        let bound = self
            .bound
            .as_ref()
            .filter(|_| self.state.is_writable())
            .ok_or_else(|| GpuError::InvalidState(format!("Cannot fill in state {:?}", self.state)))?;
        fill_image(&self.device, bound, pixels)?;
        Ok(())
    }

    /// Read the GL texture back.
    pub fn read_back(&self) -> Result<Vec<u8>> {
        let texture = self
            .texture
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState(format!("No texture in state {:?}", self.state)))?;
        Ok(self.importer.read_texture(texture)?)
    }

    /// Release every object of the chain. Idempotent.
    pub fn destroy(&mut self) {
        if self.state == ResourceState::Destroyed {
            return;
        }
        if let Some(texture) = self.texture.take() {
            texture.destroy();
        }
        drop(self.handle.take());
        drop(self.bound.take());
        self.state = ResourceState::Destroyed;
        tracing::debug!("Interop chain destroyed");
    }
}

impl Drop for InteropChain {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for InteropChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteropChain")
            .field("state", &self.state)
            .field("texture", &self.texture)
            .field("import_desc", &self.import_desc)
            .finish_non_exhaustive()
    }
}

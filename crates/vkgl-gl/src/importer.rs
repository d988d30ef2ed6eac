//! Import of exported memory as GL texture storage.

use std::rc::Rc;

use vkgl_core::{Extent2D, ImportDesc, NativeMemoryHandle, PixelFormat};

use crate::backend::{swizzle, GlBackend, GlMemoryObject, GlTexture};
use crate::error::{GlError, Result};

/// A texture with reserved storage and no data, waiting for an import.
///
/// Deleted on drop unless consumed by [`TextureImporter::import`].
pub struct PlaceholderTexture {
    backend: Rc<dyn GlBackend>,
    texture: Option<GlTexture>,
    extent: Extent2D,
    format: PixelFormat,
}

impl PlaceholderTexture {
    /// GL texture name.
    pub fn id(&self) -> u32 {
        self.texture.map_or(0, |t| t.0)
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}

impl Drop for PlaceholderTexture {
    fn drop(&mut self) {
        if let Some(texture) = self.texture.take() {
            tracing::debug!("Deleting placeholder texture {}", texture.0);
            self.backend.delete_texture(texture);
        }
    }
}

/// A GL texture whose storage is imported device memory.
///
/// Teardown order is fixed: texture, then memory object, then the native
/// handle if it was not handed over to GL.
pub struct ImportedTexture {
    backend: Rc<dyn GlBackend>,
    texture: GlTexture,
    memory_object: GlMemoryObject,
    handle: Option<NativeMemoryHandle>,
    desc: ImportDesc,
    released: bool,
}

impl ImportedTexture {
    /// GL texture name, usable anywhere a regular texture is.
    pub fn id(&self) -> u32 {
        self.texture.0
    }

    /// GL memory object name.
    pub fn memory_object(&self) -> u32 {
        self.memory_object.0
    }

    /// Description the texture was imported with.
    pub fn desc(&self) -> &ImportDesc {
        &self.desc
    }

    pub fn extent(&self) -> Extent2D {
        self.desc.extent
    }

    /// Release GL objects and the native handle now.
    pub fn destroy(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        tracing::debug!(
            "Releasing imported texture {} (memory object {})",
            self.texture.0,
            self.memory_object.0
        );
        self.backend.delete_texture(self.texture);
        self.backend.delete_memory_object(self.memory_object);
        drop(self.handle.take());
    }
}

impl Drop for ImportedTexture {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ImportedTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportedTexture")
            .field("texture", &self.texture)
            .field("memory_object", &self.memory_object)
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

/// Turns exported memory handles into GL textures.
#[derive(Clone)]
pub struct TextureImporter {
    backend: Rc<dyn GlBackend>,
}

impl TextureImporter {
    pub fn new(backend: Rc<dyn GlBackend>) -> Self {
        Self { backend }
    }

    /// Get the backend.
    pub fn backend(&self) -> &Rc<dyn GlBackend> {
        &self.backend
    }

    /// Create a texture with storage reserved for `extent` and LINEAR filtering.
    pub fn create_texture_placeholder(
        &self,
        extent: Extent2D,
        format: PixelFormat,
    ) -> Result<PlaceholderTexture> {
        extent.validate()?;
        let texture = self.backend.create_texture()?;
        let placeholder = PlaceholderTexture {
            backend: self.backend.clone(),
            texture: Some(texture),
            extent,
            format,
        };
        self.backend.define_texture_storage(texture, extent, format)?;
        tracing::debug!("Created placeholder texture {} ({extent} {format})", texture.0);
        Ok(placeholder)
    }

    /// Back `placeholder` with the memory `handle` refers to.
    ///
    /// The handle is consumed. On failure every GL object created here and
    /// the placeholder are deleted, texture first.
    pub fn import(
        &self,
        mut placeholder: PlaceholderTexture,
        mut handle: NativeMemoryHandle,
        desc: &ImportDesc,
    ) -> Result<ImportedTexture> {
        check_agreement(&placeholder, &handle, desc)?;

        let Some(texture) = placeholder.texture else {
            return Err(GlError::ResourceCreation(
                "Placeholder texture already consumed".to_string(),
            ));
        };

        let memory_object = self.backend.create_memory_object(true)?;

        let imported = handle
            .raw()
            .map_err(GlError::from)
            .and_then(|raw| {
                self.backend
                    .import_memory(memory_object, desc.allocation_size, raw, desc.handle_type)
            })
            .and_then(|()| {
                handle.mark_imported();
                self.backend.texture_storage_from_memory(
                    texture,
                    desc.extent,
                    desc.format,
                    memory_object,
                    0,
                )
            })
            .and_then(|()| match swizzle(desc.format) {
                Some(swizzle) => self.backend.set_swizzle(texture, swizzle),
                None => Ok(()),
            });

        if let Err(e) = imported {
            drop(placeholder);
            self.backend.delete_memory_object(memory_object);
            drop(handle);
            return Err(e);
        }

        placeholder.texture = None;
        tracing::info!(
            "Imported {} bytes as texture {} ({} {})",
            desc.allocation_size,
            texture.0,
            desc.extent,
            desc.format
        );

        Ok(ImportedTexture {
            backend: self.backend.clone(),
            texture,
            memory_object,
            handle: Some(handle),
            desc: *desc,
            released: false,
        })
    }

    /// Read the texture contents back as tightly packed pixels.
    pub fn read_texture(&self, texture: &ImportedTexture) -> Result<Vec<u8>> {
        self.backend
            .read_texture(texture.texture, texture.desc.extent, texture.desc.format)
    }
}

fn check_agreement(
    placeholder: &PlaceholderTexture,
    handle: &NativeMemoryHandle,
    desc: &ImportDesc,
) -> Result<()> {
    if handle.handle_type() != desc.handle_type {
        return Err(GlError::ExportImportMismatch(format!(
            "Handle is {} but import expects {}",
            handle.handle_type(),
            desc.handle_type
        )));
    }
    if !desc.size_is_sufficient() {
        return Err(GlError::ExportImportMismatch(format!(
            "Allocation of {} bytes cannot hold a {} {} image ({} bytes)",
            desc.allocation_size,
            desc.extent,
            desc.format,
            desc.min_byte_size()
        )));
    }
    if placeholder.extent != desc.extent || placeholder.format != desc.format {
        return Err(GlError::ExportImportMismatch(format!(
            "Texture is {} {} but exported image is {} {}",
            placeholder.extent, placeholder.format, desc.extent, desc.format
        )));
    }
    Ok(())
}

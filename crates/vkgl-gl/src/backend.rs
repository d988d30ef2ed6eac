//! GL calls used by the importer, behind a trait.

use std::ffi::{c_void, CStr};
use std::num::NonZeroU32;
use std::rc::Rc;

use vkgl_core::{Extent2D, HandleType, PixelFormat, RawNativeHandle};

use crate::error::{GlError, Result};
use crate::ext::{self, MemoryObjectFns};
use crate::glow::{self, HasContext};

/// GL texture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlTexture(pub u32);

/// GL memory object name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlMemoryObject(pub u32);

/// Sized internal format for a pixel format.
pub const fn internal_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rgba8Unorm | PixelFormat::Bgra8Unorm => glow::RGBA8,
        PixelFormat::Rgba8Srgb => glow::SRGB8_ALPHA8,
    }
}

/// Client-side pixel layout for uploads and readback.
///
/// Always RGBA: storage over imported memory holds the memory bytes in the
/// red, green, blue, alpha components in order, so reading them back as RGBA
/// returns the bytes in memory order for every format.
pub const fn pixel_format(_format: PixelFormat) -> u32 {
    glow::RGBA
}

/// Component swizzle that makes sampling see the format's channels.
///
/// `None` when the stored order already matches RGBA.
pub const fn swizzle(format: PixelFormat) -> Option<[u32; 4]> {
    if format.is_bgr_ordered() {
        Some([glow::BLUE, glow::GREEN, glow::RED, glow::ALPHA])
    } else {
        None
    }
}

const SWIZZLE_PARAMETERS: [u32; 4] = [
    glow::TEXTURE_SWIZZLE_R,
    glow::TEXTURE_SWIZZLE_G,
    glow::TEXTURE_SWIZZLE_B,
    glow::TEXTURE_SWIZZLE_A,
];

/// GL enum naming a handle type in import calls.
pub const fn gl_handle_type(handle_type: HandleType) -> u32 {
    match handle_type {
        HandleType::OpaqueFd => ext::HANDLE_TYPE_OPAQUE_FD_EXT,
        HandleType::OpaqueWin32 => ext::HANDLE_TYPE_OPAQUE_WIN32_EXT,
        HandleType::OpaqueWin32Kmt => ext::HANDLE_TYPE_OPAQUE_WIN32_KMT_EXT,
    }
}

fn gl_size(extent: Extent2D) -> Result<(i32, i32)> {
    match (i32::try_from(extent.width), i32::try_from(extent.height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(GlError::ResourceCreation(format!(
            "Extent {extent} does not fit a GL size"
        ))),
    }
}

/// The GL operations needed to build, sample and read back an imported texture.
///
/// All calls require the owning context to be current on this thread.
pub trait GlBackend {
    /// Returns true if the context advertises the extension.
    fn supports_extension(&self, name: &str) -> bool;

    fn create_texture(&self) -> Result<GlTexture>;

    /// Reserve storage for `texture` with no data and set LINEAR filtering.
    fn define_texture_storage(
        &self,
        texture: GlTexture,
        extent: Extent2D,
        format: PixelFormat,
    ) -> Result<()>;

    /// Create a memory object, optionally marked dedicated.
    fn create_memory_object(&self, dedicated: bool) -> Result<GlMemoryObject>;

    /// Import `handle` into `memory_object`.
    fn import_memory(
        &self,
        memory_object: GlMemoryObject,
        size: u64,
        handle: RawNativeHandle,
        handle_type: HandleType,
    ) -> Result<()>;

    /// Back `texture` with `memory_object` at `offset`, using optimal tiling.
    fn texture_storage_from_memory(
        &self,
        texture: GlTexture,
        extent: Extent2D,
        format: PixelFormat,
        memory_object: GlMemoryObject,
        offset: u64,
    ) -> Result<()>;

    /// Set the component swizzle applied when `texture` is sampled.
    fn set_swizzle(&self, texture: GlTexture, swizzle: [u32; 4]) -> Result<()>;

    /// Read level 0 of `texture` as tightly packed pixels in memory order.
    fn read_texture(&self, texture: GlTexture, extent: Extent2D, format: PixelFormat) -> Result<Vec<u8>>;

    fn delete_texture(&self, texture: GlTexture);

    fn delete_memory_object(&self, memory_object: GlMemoryObject);
}

/// [`GlBackend`] on a `glow` context plus the resolved extension table.
pub struct GlowBackend {
    gl: Rc<glow::Context>,
    ext: MemoryObjectFns,
}

impl GlowBackend {
    /// Wrap `gl` and resolve the memory object extension through `loader`.
    ///
    /// # Safety
    /// `loader` must return entry points of the context `gl` was created from.
    pub unsafe fn new(gl: Rc<glow::Context>, loader: impl FnMut(&CStr) -> *const c_void) -> Self {
        let mut ext = MemoryObjectFns::unloaded();
        ext.load(loader);
        Self { gl, ext }
    }

    /// Get the shared glow context.
    pub fn gl(&self) -> &Rc<glow::Context> {
        &self.gl
    }

    /// Get the extension table.
    pub fn ext(&self) -> &MemoryObjectFns {
        &self.ext
    }

    fn native(texture: GlTexture) -> Result<glow::NativeTexture> {
        NonZeroU32::new(texture.0)
            .map(glow::NativeTexture)
            .ok_or_else(|| GlError::ResourceCreation("Texture name 0".to_string()))
    }

    fn check(&self, call: &'static str) -> Result<()> {
        let code = unsafe { self.gl.get_error() };
        if code == glow::NO_ERROR {
            Ok(())
        } else {
            Err(GlError::Gl { call, code })
        }
    }
}

impl GlBackend for GlowBackend {
    fn supports_extension(&self, name: &str) -> bool {
        self.gl.supported_extensions().contains(name)
    }

    fn create_texture(&self) -> Result<GlTexture> {
        let texture = unsafe { self.gl.create_texture() }.map_err(GlError::ResourceCreation)?;
        Ok(GlTexture(texture.0.get()))
    }

    fn define_texture_storage(
        &self,
        texture: GlTexture,
        extent: Extent2D,
        format: PixelFormat,
    ) -> Result<()> {
        let native = Self::native(texture)?;
        let (width, height) = gl_size(extent)?;
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(native));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format(format) as i32,
                width,
                height,
                0,
                pixel_format(format),
                glow::UNSIGNED_BYTE,
                None,
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        self.check("glTexImage2D")
    }

    fn create_memory_object(&self, dedicated: bool) -> Result<GlMemoryObject> {
        let name = unsafe { self.ext.create_memory_object()? };
        self.check("glCreateMemoryObjectsEXT")?;
        if name == 0 {
            return Err(GlError::ResourceCreation(
                "glCreateMemoryObjectsEXT returned 0".to_string(),
            ));
        }
        let memory_object = GlMemoryObject(name);

        if dedicated {
            let marked = unsafe {
                self.ext
                    .memory_object_parameter(name, ext::DEDICATED_MEMORY_OBJECT_EXT, 1)
            }
            .and_then(|()| self.check("glMemoryObjectParameterivEXT"));
            if let Err(e) = marked {
                self.delete_memory_object(memory_object);
                return Err(e);
            }
        }
        Ok(memory_object)
    }

    fn import_memory(
        &self,
        memory_object: GlMemoryObject,
        size: u64,
        handle: RawNativeHandle,
        handle_type: HandleType,
    ) -> Result<()> {
        let gl_type = gl_handle_type(handle_type);
        match (handle, handle_type) {
            (RawNativeHandle::Fd(fd), HandleType::OpaqueFd) => {
                unsafe { self.ext.import_memory_fd(memory_object.0, size, gl_type, fd)? };
                self.check("glImportMemoryFdEXT")
            }
            (RawNativeHandle::Win32(raw), HandleType::OpaqueWin32 | HandleType::OpaqueWin32Kmt) => {
                unsafe {
                    self.ext
                        .import_memory_win32_handle(memory_object.0, size, gl_type, raw)?;
                }
                self.check("glImportMemoryWin32HandleEXT")
            }
            (handle, handle_type) => Err(GlError::ExportImportMismatch(format!(
                "Handle {handle:?} cannot be imported as {handle_type}"
            ))),
        }
    }

    fn texture_storage_from_memory(
        &self,
        texture: GlTexture,
        extent: Extent2D,
        format: PixelFormat,
        memory_object: GlMemoryObject,
        offset: u64,
    ) -> Result<()> {
        let native = Self::native(texture)?;
        let (width, height) = gl_size(extent)?;
        let result = unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(native));
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                ext::TEXTURE_TILING_EXT,
                ext::OPTIMAL_TILING_EXT as i32,
            );
            let stored = self.ext.tex_storage_mem_2d(
                glow::TEXTURE_2D,
                1,
                internal_format(format),
                width,
                height,
                memory_object.0,
                offset,
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            stored
        };
        result?;
        self.check("glTexStorageMem2DEXT")
    }

    fn set_swizzle(&self, texture: GlTexture, swizzle: [u32; 4]) -> Result<()> {
        let native = Self::native(texture)?;
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(native));
            for (parameter, source) in SWIZZLE_PARAMETERS.into_iter().zip(swizzle) {
                self.gl
                    .tex_parameter_i32(glow::TEXTURE_2D, parameter, source as i32);
            }
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        self.check("glTexParameteri")
    }

    fn read_texture(&self, texture: GlTexture, extent: Extent2D, format: PixelFormat) -> Result<Vec<u8>> {
        let native = Self::native(texture)?;
        let len = usize::try_from(format.byte_size(extent))
            .map_err(|_| GlError::ResourceCreation(format!("Texture {extent} too large to read")))?;
        let mut pixels = vec![0u8; len];
        let result = unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(native));
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            let read = self.ext.get_tex_image(
                glow::TEXTURE_2D,
                0,
                pixel_format(format),
                glow::UNSIGNED_BYTE,
                &mut pixels,
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            read
        };
        result?;
        self.check("glGetTexImage")?;
        Ok(pixels)
    }

    fn delete_texture(&self, texture: GlTexture) {
        if let Ok(native) = Self::native(texture) {
            unsafe { self.gl.delete_texture(native) };
        }
    }

    fn delete_memory_object(&self, memory_object: GlMemoryObject) {
        if let Err(e) = unsafe { self.ext.delete_memory_object(memory_object.0) } {
            tracing::warn!("Failed to delete memory object {}: {e}", memory_object.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_mapping() {
        assert_eq!(internal_format(PixelFormat::Rgba8Unorm), glow::RGBA8);
        assert_eq!(internal_format(PixelFormat::Rgba8Srgb), glow::SRGB8_ALPHA8);
        assert_eq!(internal_format(PixelFormat::Bgra8Unorm), glow::RGBA8);
        assert_eq!(pixel_format(PixelFormat::Bgra8Unorm), glow::RGBA);
    }

    #[test]
    fn only_bgra_is_swizzled() {
        assert_eq!(
            swizzle(PixelFormat::Bgra8Unorm),
            Some([glow::BLUE, glow::GREEN, glow::RED, glow::ALPHA])
        );
        assert_eq!(swizzle(PixelFormat::Rgba8Unorm), None);
        assert_eq!(swizzle(PixelFormat::Rgba8Srgb), None);
    }

    #[test]
    fn handle_type_enums() {
        assert_eq!(gl_handle_type(HandleType::OpaqueFd), 0x9586);
        assert_eq!(gl_handle_type(HandleType::OpaqueWin32), 0x9587);
    }

    #[test]
    fn oversized_extent_is_rejected() {
        assert!(gl_size(Extent2D::new(u32::MAX, 1)).is_err());
        assert_eq!(gl_size(Extent2D::square(128)).unwrap(), (128, 128));
    }
}

//! In-memory implementation of [`GlBackend`].

use std::cell::Cell;

use vkgl_core::{Extent2D, HandleType, PixelFormat, RawNativeHandle};
use vkgl_gl::glow;
use vkgl_gl::{GlBackend, GlError, GlMemoryObject, GlTexture, Result};

use super::world::{MockEvent, MockMemoryObject, MockTexture, MockWorld};

/// Mock GL context sharing memory with the mock Vulkan driver.
///
/// An imported fd is owned by the memory object from the moment the import
/// succeeds and closed when the memory object is deleted.
pub struct MockGl {
    world: MockWorld,
    extensions: Vec<String>,
    fail_import: Cell<bool>,
}

impl MockGl {
    /// Context advertising the memory object extensions for every handle type.
    pub fn new(world: &MockWorld) -> Self {
        Self {
            world: world.clone(),
            extensions: [
                "GL_EXT_memory_object",
                "GL_EXT_memory_object_fd",
                "GL_EXT_memory_object_win32",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            fail_import: Cell::new(false),
        }
    }

    /// Context advertising only `extensions`.
    pub fn with_extensions(world: &MockWorld, extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| (*e).to_string()).collect(),
            ..Self::new(world)
        }
    }

    /// Make every subsequent import fail with `GL_INVALID_OPERATION`.
    pub fn fail_imports(&self, fail: bool) {
        self.fail_import.set(fail);
    }

    /// The texel at `(x, y)` as a shader sampling `texture` sees it.
    ///
    /// Stored components are the memory bytes in order; the texture's swizzle
    /// is applied on top. `None` if the texture or texel does not exist.
    pub fn sample(&self, texture: GlTexture, x: u32, y: u32) -> Option<[u8; 4]> {
        let state = self.world.lock();
        let tex = state.textures.get(&texture.0)?;
        if x >= tex.extent.width || y >= tex.extent.height {
            return None;
        }
        let stored: [u8; 4] = match tex.block.and_then(|id| state.blocks.get(&id)) {
            Some(block) => {
                let at = (y as usize * tex.extent.width as usize + x as usize) * 4;
                block.bytes.get(at..at + 4)?.try_into().ok()?
            }
            None => [0; 4],
        };
        let Some(swizzle) = tex.swizzle else {
            return Some(stored);
        };
        let mut texel = [0u8; 4];
        for (out, source) in texel.iter_mut().zip(swizzle) {
            *out = match source {
                glow::RED => stored[0],
                glow::GREEN => stored[1],
                glow::BLUE => stored[2],
                glow::ALPHA => stored[3],
                glow::ONE => u8::MAX,
                _ => 0,
            };
        }
        Some(texel)
    }

    fn require(&self, extension: &str, entry_point: &'static str) -> Result<()> {
        if self.supports_extension(extension) {
            Ok(())
        } else {
            Err(GlError::FunctionNotLoaded(entry_point))
        }
    }
}

fn gl_error(call: &'static str, code: u32) -> GlError {
    GlError::Gl { call, code }
}

impl GlBackend for MockGl {
    fn supports_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e == name)
    }

    fn create_texture(&self) -> Result<GlTexture> {
        let mut state = self.world.lock();
        let name = state.next_gl_name();
        state.textures.insert(
            name,
            MockTexture {
                extent: Extent2D::default(),
                format: PixelFormat::default(),
                block: None,
                swizzle: None,
            },
        );
        state.record(MockEvent::CreateTexture);
        Ok(GlTexture(name))
    }

    fn define_texture_storage(
        &self,
        texture: GlTexture,
        extent: Extent2D,
        format: PixelFormat,
    ) -> Result<()> {
        let mut state = self.world.lock();
        let tex = state
            .textures
            .get_mut(&texture.0)
            .ok_or_else(|| gl_error("glTexImage2D", glow::INVALID_OPERATION))?;
        tex.extent = extent;
        tex.format = format;
        Ok(())
    }

    fn create_memory_object(&self, dedicated: bool) -> Result<GlMemoryObject> {
        self.require("GL_EXT_memory_object", "glCreateMemoryObjectsEXT")?;
        let mut state = self.world.lock();
        let name = state.next_gl_name();
        state.memory_objects.insert(
            name,
            MockMemoryObject {
                dedicated,
                ..Default::default()
            },
        );
        state.record(MockEvent::CreateMemoryObject);
        Ok(GlMemoryObject(name))
    }

    fn import_memory(
        &self,
        memory_object: GlMemoryObject,
        size: u64,
        handle: RawNativeHandle,
        handle_type: HandleType,
    ) -> Result<()> {
        let (call, extension) = match handle_type {
            HandleType::OpaqueFd => ("glImportMemoryFdEXT", "GL_EXT_memory_object_fd"),
            HandleType::OpaqueWin32 | HandleType::OpaqueWin32Kmt => {
                ("glImportMemoryWin32HandleEXT", "GL_EXT_memory_object_win32")
            }
        };
        self.require(extension, call)?;
        if self.fail_import.get() {
            return Err(gl_error(call, glow::INVALID_OPERATION));
        }

        let RawNativeHandle::Fd(fd) = handle else {
            return Err(gl_error(call, glow::INVALID_ENUM));
        };
        import_fd(&self.world, memory_object, size, fd, call)
    }

    fn texture_storage_from_memory(
        &self,
        texture: GlTexture,
        extent: Extent2D,
        format: PixelFormat,
        memory_object: GlMemoryObject,
        offset: u64,
    ) -> Result<()> {
        const CALL: &str = "glTexStorageMem2DEXT";
        let mut state = self.world.lock();
        let block = state
            .memory_objects
            .get(&memory_object.0)
            .and_then(|m| m.block)
            .ok_or_else(|| gl_error(CALL, glow::INVALID_OPERATION))?;
        let available = state.blocks.get(&block).map_or(0, |b| b.bytes.len() as u64);
        if offset + format.byte_size(extent) > available {
            return Err(gl_error(CALL, glow::INVALID_VALUE));
        }
        let tex = state
            .textures
            .get_mut(&texture.0)
            .ok_or_else(|| gl_error(CALL, glow::INVALID_OPERATION))?;
        tex.extent = extent;
        tex.format = format;
        tex.block = Some(block);
        Ok(())
    }

    fn set_swizzle(&self, texture: GlTexture, swizzle: [u32; 4]) -> Result<()> {
        let mut state = self.world.lock();
        let tex = state
            .textures
            .get_mut(&texture.0)
            .ok_or_else(|| gl_error("glTexParameteri", glow::INVALID_OPERATION))?;
        tex.swizzle = Some(swizzle);
        Ok(())
    }

    fn read_texture(&self, texture: GlTexture, extent: Extent2D, format: PixelFormat) -> Result<Vec<u8>> {
        const CALL: &str = "glGetTexImage";
        let state = self.world.lock();
        let tex = state
            .textures
            .get(&texture.0)
            .ok_or_else(|| gl_error(CALL, glow::INVALID_OPERATION))?;
        if tex.extent != extent || tex.format != format {
            return Err(gl_error(CALL, glow::INVALID_OPERATION));
        }
        let len = format.byte_size(extent) as usize;
        match tex.block.and_then(|id| state.blocks.get(&id)) {
            Some(block) => Ok(block.bytes[..len].to_vec()),
            // Storage without imported memory reads as zeros.
            None => Ok(vec![0; len]),
        }
    }

    fn delete_texture(&self, texture: GlTexture) {
        let mut state = self.world.lock();
        if state.textures.remove(&texture.0).is_some() {
            state.record(MockEvent::DeleteTexture);
        }
    }

    fn delete_memory_object(&self, memory_object: GlMemoryObject) {
        let mut state = self.world.lock();
        let Some(object) = state.memory_objects.remove(&memory_object.0) else {
            return;
        };
        if let Some(block) = object.block {
            state.release_block(block);
        }
        state.record(MockEvent::DeleteMemoryObject);
        if close_imported_fd(object) {
            state.record(MockEvent::ReleaseHandle);
        }
    }
}

/// Drops `object`, closing the fd it owns. Returns true if there was one.
#[cfg(unix)]
fn close_imported_fd(object: MockMemoryObject) -> bool {
    object.fd.is_some()
}

#[cfg(not(unix))]
fn close_imported_fd(_object: MockMemoryObject) -> bool {
    false
}

#[cfg(unix)]
fn import_fd(
    world: &MockWorld,
    memory_object: GlMemoryObject,
    size: u64,
    fd: i32,
    call: &'static str,
) -> Result<()> {
    use std::os::fd::{FromRawFd, OwnedFd};

    let mut state = world.lock();
    state.prune_exports();
    let block = state
        .exported_fds
        .get(&fd)
        .map(|exported| exported.block)
        .ok_or_else(|| gl_error(call, glow::INVALID_VALUE))?;
    let available = state.blocks.get(&block).map_or(0, |b| b.bytes.len() as u64);
    if size > available {
        return Err(gl_error(call, glow::INVALID_VALUE));
    }
    if !state.memory_objects.contains_key(&memory_object.0) {
        return Err(gl_error(call, glow::INVALID_OPERATION));
    }

    state.exported_fds.remove(&fd);
    state.retain_block(block);
    if let Some(object) = state.memory_objects.get_mut(&memory_object.0) {
        object.block = Some(block);
        // SAFETY: a successful import hands the descriptor to GL; the
        // exporting side gives it up without closing it.
        object.fd = Some(unsafe { OwnedFd::from_raw_fd(fd) });
    }
    state.record(MockEvent::ImportMemory);
    Ok(())
}

#[cfg(not(unix))]
fn import_fd(
    _world: &MockWorld,
    _memory_object: GlMemoryObject,
    _size: u64,
    _fd: i32,
    call: &'static str,
) -> Result<()> {
    Err(gl_error(call, glow::INVALID_ENUM))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_object_requires_extension() {
        let world = MockWorld::new();
        let gl = MockGl::with_extensions(&world, &[]);
        assert!(matches!(
            gl.create_memory_object(true),
            Err(GlError::FunctionNotLoaded("glCreateMemoryObjectsEXT"))
        ));
    }

    #[test]
    fn unknown_fd_is_rejected() {
        let world = MockWorld::new();
        let gl = MockGl::new(&world);
        let memory = gl.create_memory_object(true).unwrap();
        let err = gl
            .import_memory(memory, 16, RawNativeHandle::Fd(-1), HandleType::OpaqueFd)
            .unwrap_err();
        assert!(matches!(err, GlError::Gl { .. }));
        gl.delete_memory_object(memory);
        assert_eq!(world.live().memory_objects, 0);
    }

    #[test]
    fn unbacked_texture_reads_zeros() {
        let world = MockWorld::new();
        let gl = MockGl::new(&world);
        let texture = gl.create_texture().unwrap();
        gl.define_texture_storage(texture, Extent2D::square(2), PixelFormat::Rgba8Unorm)
            .unwrap();
        let pixels = gl
            .read_texture(texture, Extent2D::square(2), PixelFormat::Rgba8Unorm)
            .unwrap();
        assert_eq!(pixels, vec![0; 16]);
    }

    #[test]
    fn swizzle_applies_when_sampling() {
        let world = MockWorld::new();
        let gl = MockGl::new(&world);
        let texture = gl.create_texture().unwrap();
        gl.define_texture_storage(texture, Extent2D::square(1), PixelFormat::Bgra8Unorm)
            .unwrap();
        gl.set_swizzle(texture, [glow::ONE, glow::GREEN, glow::RED, glow::ZERO])
            .unwrap();
        assert_eq!(gl.sample(texture, 0, 0), Some([255, 0, 0, 0]));
        assert_eq!(gl.sample(texture, 1, 0), None);
    }
}

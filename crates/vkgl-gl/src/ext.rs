//! `GL_EXT_memory_object` entry points.
//!
//! None of these are part of core GL, so they are resolved at runtime through
//! the context's proc-address loader. The table starts out empty; any call made
//! before [`MemoryObjectFns::load`] or for an entry point the driver does not
//! expose fails with [`GlError::FunctionNotLoaded`].

use std::ffi::{c_void, CStr};

use crate::error::{GlError, Result};

pub const TEXTURE_TILING_EXT: u32 = 0x9580;
pub const DEDICATED_MEMORY_OBJECT_EXT: u32 = 0x9581;
pub const OPTIMAL_TILING_EXT: u32 = 0x9584;
pub const HANDLE_TYPE_OPAQUE_FD_EXT: u32 = 0x9586;
pub const HANDLE_TYPE_OPAQUE_WIN32_EXT: u32 = 0x9587;
pub const HANDLE_TYPE_OPAQUE_WIN32_KMT_EXT: u32 = 0x9588;

type PfnCreateMemoryObjects = unsafe extern "system" fn(n: i32, memory_objects: *mut u32);
type PfnDeleteMemoryObjects = unsafe extern "system" fn(n: i32, memory_objects: *const u32);
type PfnMemoryObjectParameteriv =
    unsafe extern "system" fn(memory_object: u32, pname: u32, params: *const i32);
type PfnImportMemoryFd = unsafe extern "system" fn(memory: u32, size: u64, handle_type: u32, fd: i32);
type PfnImportMemoryWin32Handle =
    unsafe extern "system" fn(memory: u32, size: u64, handle_type: u32, handle: *mut c_void);
type PfnTexStorageMem2D = unsafe extern "system" fn(
    target: u32,
    levels: i32,
    internal_format: u32,
    width: i32,
    height: i32,
    memory: u32,
    offset: u64,
);
type PfnGetTexImage =
    unsafe extern "system" fn(target: u32, level: i32, format: u32, ty: u32, pixels: *mut c_void);

/// Runtime-resolved memory object entry points.
#[derive(Default, Clone, Copy)]
pub struct MemoryObjectFns {
    create_memory_objects: Option<PfnCreateMemoryObjects>,
    delete_memory_objects: Option<PfnDeleteMemoryObjects>,
    memory_object_parameteriv: Option<PfnMemoryObjectParameteriv>,
    import_memory_fd: Option<PfnImportMemoryFd>,
    import_memory_win32_handle: Option<PfnImportMemoryWin32Handle>,
    tex_storage_mem_2d: Option<PfnTexStorageMem2D>,
    get_tex_image: Option<PfnGetTexImage>,
}

macro_rules! resolve {
    ($loader:ident, $name:literal, $ty:ty) => {{
        let ptr = $loader($name);
        if ptr.is_null() {
            None
        } else {
            // SAFETY: the loader returned the driver's entry point for this
            // exact name, whose signature is fixed by the extension.
            Some(unsafe { std::mem::transmute::<*const c_void, $ty>(ptr) })
        }
    }};
}

impl MemoryObjectFns {
    /// Table with nothing resolved.
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// Resolve every entry point through `loader`.
    ///
    /// Entry points the driver does not expose stay unresolved.
    pub fn load(&mut self, mut loader: impl FnMut(&CStr) -> *const c_void) {
        self.create_memory_objects =
            resolve!(loader, c"glCreateMemoryObjectsEXT", PfnCreateMemoryObjects);
        self.delete_memory_objects =
            resolve!(loader, c"glDeleteMemoryObjectsEXT", PfnDeleteMemoryObjects);
        self.memory_object_parameteriv =
            resolve!(loader, c"glMemoryObjectParameterivEXT", PfnMemoryObjectParameteriv);
        self.import_memory_fd = resolve!(loader, c"glImportMemoryFdEXT", PfnImportMemoryFd);
        self.import_memory_win32_handle = resolve!(
            loader,
            c"glImportMemoryWin32HandleEXT",
            PfnImportMemoryWin32Handle
        );
        self.tex_storage_mem_2d = resolve!(loader, c"glTexStorageMem2DEXT", PfnTexStorageMem2D);
        self.get_tex_image = resolve!(loader, c"glGetTexImage", PfnGetTexImage);

        tracing::debug!(
            "Resolved GL memory object entry points (fd import: {}, win32 import: {})",
            self.import_memory_fd.is_some(),
            self.import_memory_win32_handle.is_some()
        );
    }

    /// Returns true if the core memory object entry points are resolved.
    pub fn is_loaded(&self) -> bool {
        self.create_memory_objects.is_some()
            && self.delete_memory_objects.is_some()
            && self.tex_storage_mem_2d.is_some()
    }

    /// `glCreateMemoryObjectsEXT` for a single object.
    ///
    /// # Safety
    /// A GL context exposing `GL_EXT_memory_object` must be current.
    pub unsafe fn create_memory_object(&self) -> Result<u32> {
        let f = self
            .create_memory_objects
            .ok_or(GlError::FunctionNotLoaded("glCreateMemoryObjectsEXT"))?;
        let mut name = 0;
        unsafe { f(1, &mut name) };
        Ok(name)
    }

    /// `glDeleteMemoryObjectsEXT` for a single object.
    ///
    /// # Safety
    /// A GL context exposing `GL_EXT_memory_object` must be current.
    pub unsafe fn delete_memory_object(&self, memory_object: u32) -> Result<()> {
        let f = self
            .delete_memory_objects
            .ok_or(GlError::FunctionNotLoaded("glDeleteMemoryObjectsEXT"))?;
        unsafe { f(1, &memory_object) };
        Ok(())
    }

    /// `glMemoryObjectParameterivEXT` with a single value.
    ///
    /// # Safety
    /// A GL context exposing `GL_EXT_memory_object` must be current.
    pub unsafe fn memory_object_parameter(&self, memory_object: u32, pname: u32, value: i32) -> Result<()> {
        let f = self
            .memory_object_parameteriv
            .ok_or(GlError::FunctionNotLoaded("glMemoryObjectParameterivEXT"))?;
        unsafe { f(memory_object, pname, &value) };
        Ok(())
    }

    /// `glImportMemoryFdEXT`. Ownership of `fd` passes to GL on success.
    ///
    /// # Safety
    /// A GL context exposing `GL_EXT_memory_object_fd` must be current.
    pub unsafe fn import_memory_fd(&self, memory: u32, size: u64, handle_type: u32, fd: i32) -> Result<()> {
        let f = self
            .import_memory_fd
            .ok_or(GlError::FunctionNotLoaded("glImportMemoryFdEXT"))?;
        unsafe { f(memory, size, handle_type, fd) };
        Ok(())
    }

    /// `glImportMemoryWin32HandleEXT`. The caller keeps ownership of `handle`.
    ///
    /// # Safety
    /// A GL context exposing `GL_EXT_memory_object_win32` must be current.
    pub unsafe fn import_memory_win32_handle(
        &self,
        memory: u32,
        size: u64,
        handle_type: u32,
        handle: isize,
    ) -> Result<()> {
        let f = self
            .import_memory_win32_handle
            .ok_or(GlError::FunctionNotLoaded("glImportMemoryWin32HandleEXT"))?;
        unsafe { f(memory, size, handle_type, handle as *mut c_void) };
        Ok(())
    }

    /// `glTexStorageMem2DEXT`
    ///
    /// # Safety
    /// A GL context exposing `GL_EXT_memory_object` must be current.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn tex_storage_mem_2d(
        &self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        memory: u32,
        offset: u64,
    ) -> Result<()> {
        let f = self
            .tex_storage_mem_2d
            .ok_or(GlError::FunctionNotLoaded("glTexStorageMem2DEXT"))?;
        unsafe { f(target, levels, internal_format, width, height, memory, offset) };
        Ok(())
    }

    /// `glGetTexImage` into `pixels`.
    ///
    /// # Safety
    /// A GL context must be current and `pixels` must be large enough for
    /// level `level` of the bound texture in `format`/`ty`.
    pub unsafe fn get_tex_image(
        &self,
        target: u32,
        level: i32,
        format: u32,
        ty: u32,
        pixels: &mut [u8],
    ) -> Result<()> {
        let f = self
            .get_tex_image
            .ok_or(GlError::FunctionNotLoaded("glGetTexImage"))?;
        unsafe { f(target, level, format, ty, pixels.as_mut_ptr().cast()) };
        Ok(())
    }
}

impl std::fmt::Debug for MemoryObjectFns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectFns")
            .field("loaded", &self.is_loaded())
            .field("import_memory_fd", &self.import_memory_fd.is_some())
            .field(
                "import_memory_win32_handle",
                &self.import_memory_win32_handle.is_some(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unloaded_table_reports_function_not_loaded() {
        let fns = MemoryObjectFns::unloaded();
        assert!(!fns.is_loaded());
        let err = unsafe { fns.create_memory_object() }.unwrap_err();
        assert!(matches!(err, GlError::FunctionNotLoaded("glCreateMemoryObjectsEXT")));
    }

    #[test]
    fn null_loader_leaves_table_unloaded() {
        let mut fns = MemoryObjectFns::unloaded();
        let mut requested = Vec::new();
        fns.load(|name| {
            requested.push(name.to_owned());
            std::ptr::null()
        });
        assert!(!fns.is_loaded());
        assert_eq!(requested.len(), 7);
        assert!(matches!(
            unsafe { fns.import_memory_fd(1, 64, HANDLE_TYPE_OPAQUE_FD_EXT, 3) },
            Err(GlError::FunctionNotLoaded("glImportMemoryFdEXT"))
        ));
    }

    unsafe extern "system" fn fake_create(n: i32, out: *mut u32) {
        for i in 0..n as usize {
            unsafe { *out.add(i) = 7 };
        }
    }

    #[test]
    fn resolved_entry_point_is_called() {
        let mut fns = MemoryObjectFns::unloaded();
        fns.load(|name| {
            if name == c"glCreateMemoryObjectsEXT" {
                fake_create as *const c_void
            } else {
                std::ptr::null()
            }
        });
        assert_eq!(unsafe { fns.create_memory_object() }.unwrap(), 7);
    }
}

//! Owned OS handles referencing exported device memory.

#[cfg(unix)]
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd};

use crate::error::{Error, Result};
use crate::types::HandleType;

/// Borrowed view of a native handle value, as passed to import entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawNativeHandle {
    Fd(i32),
    Win32(isize),
}

enum Inner {
    #[cfg(unix)]
    Fd(OwnedFd),
    Win32(isize),
}

/// OS handle referencing the same physical memory as an exported allocation.
///
/// The handle is single use: an importer reads it through [`Self::raw`] and
/// then calls [`Self::mark_imported`]. For handle types whose import transfers
/// ownership the OS reference is given up at that point; otherwise it is
/// closed when this value is dropped.
pub struct NativeMemoryHandle {
    handle_type: HandleType,
    inner: Option<Inner>,
    imported: bool,
}

impl NativeMemoryHandle {
    /// Wrap an owned file descriptor.
    #[cfg(unix)]
    pub fn from_fd(handle_type: HandleType, fd: OwnedFd) -> Self {
        Self {
            handle_type,
            inner: Some(Inner::Fd(fd)),
            imported: false,
        }
    }

    /// Wrap a raw Win32 handle value.
    ///
    /// # Safety
    /// `raw` must be a handle the caller owns. On Windows it is closed on drop
    /// for handle types that require it.
    pub unsafe fn from_raw_win32(handle_type: HandleType, raw: isize) -> Self {
        Self {
            handle_type,
            inner: Some(Inner::Win32(raw)),
            imported: false,
        }
    }

    /// Handle type this value was exported as.
    pub fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    /// Returns true once an importer has consumed this handle.
    pub fn is_imported(&self) -> bool {
        self.imported
    }

    /// Raw handle value for an import call.
    pub fn raw(&self) -> Result<RawNativeHandle> {
        if self.imported {
            return Err(Error::HandleConsumed);
        }
        match self.inner.as_ref() {
            #[cfg(unix)]
            Some(Inner::Fd(fd)) => Ok(RawNativeHandle::Fd(fd.as_raw_fd())),
            Some(Inner::Win32(raw)) => Ok(RawNativeHandle::Win32(*raw)),
            None => Err(Error::HandleConsumed),
        }
    }

    /// Record a successful import.
    ///
    /// Handles whose ownership moved to the importer are released without
    /// being closed.
    pub fn mark_imported(&mut self) {
        self.imported = true;
        if self.handle_type.import_transfers_ownership() {
            match self.inner.take() {
                #[cfg(unix)]
                Some(Inner::Fd(fd)) => {
                    let _ = fd.into_raw_fd();
                }
                Some(Inner::Win32(_)) | None => {}
            }
        }
    }

    /// Returns true while this value still holds an OS reference.
    pub fn holds_os_reference(&self) -> bool {
        self.inner.is_some()
    }
}

impl std::fmt::Debug for NativeMemoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let raw = match self.inner.as_ref() {
            #[cfg(unix)]
            Some(Inner::Fd(fd)) => Some(RawNativeHandle::Fd(fd.as_raw_fd())),
            Some(Inner::Win32(raw)) => Some(RawNativeHandle::Win32(*raw)),
            None => None,
        };
        f.debug_struct("NativeMemoryHandle")
            .field("handle_type", &self.handle_type)
            .field("raw", &raw)
            .field("imported", &self.imported)
            .finish()
    }
}

impl Drop for NativeMemoryHandle {
    fn drop(&mut self) {
        // OwnedFd closes itself; Win32 handles need an explicit close.
        if let Some(Inner::Win32(raw)) = self.inner.take() {
            if self.handle_type.requires_close() {
                close_win32(raw);
            }
        }
    }
}

#[cfg(windows)]
fn close_win32(raw: isize) {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};

    // SAFETY: the handle was handed to us as owned in `from_raw_win32`.
    if let Err(e) = unsafe { CloseHandle(HANDLE(raw as _)) } {
        tracing::warn!("Failed to close Win32 memory handle {raw:#x}: {e}");
    }
}

#[cfg(not(windows))]
fn close_win32(raw: isize) {
    tracing::debug!("Dropping Win32 handle value {raw:#x} on a non-Windows host");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs::File;

    fn dev_null() -> OwnedFd {
        File::open("/dev/null").unwrap().into()
    }

    #[test]
    fn raw_is_unavailable_after_import() {
        let mut handle = NativeMemoryHandle::from_fd(HandleType::OpaqueFd, dev_null());
        assert!(matches!(handle.raw().unwrap(), RawNativeHandle::Fd(_)));

        handle.mark_imported();
        assert!(handle.is_imported());
        assert!(matches!(handle.raw(), Err(Error::HandleConsumed)));
    }

    #[test]
    fn fd_import_gives_up_the_os_reference() {
        let file = File::open("/dev/null").unwrap();
        let fd: OwnedFd = file.into();
        let raw = fd.as_raw_fd();
        let mut handle = NativeMemoryHandle::from_fd(HandleType::OpaqueFd, fd);

        handle.mark_imported();
        assert!(!handle.holds_os_reference());

        // The descriptor now belongs to "the importer"; reclaim it so the test
        // does not leak.
        // SAFETY: nothing else closes `raw` after mark_imported.
        drop(unsafe { <OwnedFd as std::os::fd::FromRawFd>::from_raw_fd(raw) });
    }
}

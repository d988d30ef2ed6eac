//! Image and handle vocabulary shared by the Vulkan and OpenGL sides.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Width and height of a 2D image in texels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    /// Create a new extent
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Square extent with the same width and height
    #[inline]
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// Returns true if either dimension is zero
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of texels covered by this extent
    #[inline]
    pub const fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Fail with [`Error::InvalidExtent`] if either dimension is zero.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidExtent {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Extent2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel formats both APIs agree on.
///
/// Only 8-bit-per-channel color formats are listed; they are the ones that map
/// one-to-one between `VkFormat` and a sized GL internal format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
}

impl PixelFormat {
    /// Bytes per texel
    #[inline]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8Unorm | Self::Rgba8Srgb | Self::Bgra8Unorm => 4,
        }
    }

    /// Tightly packed byte size of an image with this format
    #[inline]
    pub const fn byte_size(self, extent: Extent2D) -> u64 {
        extent.texel_count() * self.bytes_per_pixel() as u64
    }

    /// Returns true if red and blue are stored swapped relative to RGBA.
    #[inline]
    pub const fn is_bgr_ordered(self) -> bool {
        matches!(self, Self::Bgra8Unorm)
    }

    /// Reorder tightly packed RGBA8 texels into this format's byte order.
    pub fn reorder_rgba8(self, mut rgba: Vec<u8>) -> Vec<u8> {
        if self.is_bgr_ordered() {
            for texel in rgba.chunks_exact_mut(4) {
                texel.swap(0, 2);
            }
        }
        rgba
    }

    /// Lowercase name used on the command line and in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgba8Unorm => "rgba8",
            Self::Rgba8Srgb => "rgba8-srgb",
            Self::Bgra8Unorm => "bgra8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rgba8" | "rgba8-unorm" => Ok(Self::Rgba8Unorm),
            "rgba8-srgb" | "srgb" => Ok(Self::Rgba8Srgb),
            "bgra8" | "bgra8-unorm" => Ok(Self::Bgra8Unorm),
            other => Err(Error::UnknownPixelFormat(other.to_string())),
        }
    }
}

/// OS-level handle kind used to share device memory between APIs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleType {
    /// POSIX file descriptor (`VK_KHR_external_memory_fd`).
    OpaqueFd,
    /// NT handle (`VK_KHR_external_memory_win32`).
    OpaqueWin32,
    /// Legacy global share handle; not reference counted by the OS.
    OpaqueWin32Kmt,
}

impl HandleType {
    /// Handle type native to the platform this binary was built for.
    pub const fn platform_default() -> Self {
        if cfg!(windows) {
            Self::OpaqueWin32
        } else {
            Self::OpaqueFd
        }
    }

    /// Whether the current platform can produce handles of this type.
    pub const fn is_native(self) -> bool {
        match self {
            Self::OpaqueFd => cfg!(unix),
            Self::OpaqueWin32 | Self::OpaqueWin32Kmt => cfg!(windows),
        }
    }

    /// Whether a successful GL import takes ownership of the handle.
    ///
    /// `GL_EXT_memory_object_fd` transfers the fd to the GL driver; the Win32
    /// variants leave the handle with the caller.
    pub const fn import_transfers_ownership(self) -> bool {
        matches!(self, Self::OpaqueFd)
    }

    /// Whether the OS handle must be closed once no longer needed.
    pub const fn requires_close(self) -> bool {
        !matches!(self, Self::OpaqueWin32Kmt)
    }

    /// Vulkan device extension providing the export entry point.
    pub const fn vulkan_extension(self) -> &'static str {
        match self {
            Self::OpaqueFd => "VK_KHR_external_memory_fd",
            Self::OpaqueWin32 | Self::OpaqueWin32Kmt => "VK_KHR_external_memory_win32",
        }
    }

    /// Vulkan entry point that extracts the native handle.
    pub const fn vulkan_entry_point(self) -> &'static str {
        match self {
            Self::OpaqueFd => "vkGetMemoryFdKHR",
            Self::OpaqueWin32 | Self::OpaqueWin32Kmt => "vkGetMemoryWin32HandleKHR",
        }
    }

    /// GL extension providing the import entry point.
    pub const fn gl_extension(self) -> &'static str {
        match self {
            Self::OpaqueFd => "GL_EXT_memory_object_fd",
            Self::OpaqueWin32 | Self::OpaqueWin32Kmt => "GL_EXT_memory_object_win32",
        }
    }

    /// Lowercase name used on the command line and in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpaqueFd => "fd",
            Self::OpaqueWin32 => "win32",
            Self::OpaqueWin32Kmt => "win32-kmt",
        }
    }
}

impl Default for HandleType {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for HandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HandleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fd" | "opaque-fd" => Ok(Self::OpaqueFd),
            "win32" | "opaque-win32" => Ok(Self::OpaqueWin32),
            "win32-kmt" | "kmt" | "opaque-win32-kmt" => Ok(Self::OpaqueWin32Kmt),
            other => Err(Error::UnknownHandleType(other.to_string())),
        }
    }
}

/// Everything the importing API needs to know about an exported allocation.
///
/// `allocation_size` is the size reported by the exporter's memory
/// requirements query. It is passed to the import call unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportDesc {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub allocation_size: u64,
    pub handle_type: HandleType,
}

impl ImportDesc {
    /// Smallest allocation that can back an image of this extent and format.
    #[inline]
    pub const fn min_byte_size(&self) -> u64 {
        self.format.byte_size(self.extent)
    }

    /// Returns true if the allocation is large enough for the image.
    #[inline]
    pub const fn size_is_sufficient(&self) -> bool {
        self.allocation_size >= self.min_byte_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_texel_count_does_not_overflow() {
        let extent = Extent2D::new(u32::MAX, 2);
        assert_eq!(extent.texel_count(), u64::from(u32::MAX) * 2);
    }

    #[test]
    fn empty_extent_is_rejected() {
        assert!(Extent2D::new(0, 128).validate().is_err());
        assert!(Extent2D::new(128, 0).validate().is_err());
        assert!(Extent2D::square(128).validate().is_ok());
    }

    #[test]
    fn rgba8_byte_size() {
        assert_eq!(PixelFormat::Rgba8Unorm.byte_size(Extent2D::square(128)), 65_536);
    }

    #[test]
    fn bgra_reorders_red_and_blue() {
        let rgba = vec![0xFF, 0x10, 0x00, 0x80, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            PixelFormat::Bgra8Unorm.reorder_rgba8(rgba.clone()),
            vec![0x00, 0x10, 0xFF, 0x80, 0x03, 0x02, 0x01, 0x04]
        );
        assert_eq!(PixelFormat::Rgba8Unorm.reorder_rgba8(rgba.clone()), rgba);
    }

    #[test]
    fn handle_type_parsing() {
        assert_eq!("fd".parse::<HandleType>().unwrap(), HandleType::OpaqueFd);
        assert_eq!("WIN32".parse::<HandleType>().unwrap(), HandleType::OpaqueWin32);
        assert_eq!("kmt".parse::<HandleType>().unwrap(), HandleType::OpaqueWin32Kmt);
        assert!("dmabuf".parse::<HandleType>().is_err());
    }

    #[test]
    fn platform_default_is_native() {
        assert!(HandleType::platform_default().is_native());
    }

    #[test]
    fn only_fd_imports_transfer_ownership() {
        assert!(HandleType::OpaqueFd.import_transfers_ownership());
        assert!(!HandleType::OpaqueWin32.import_transfers_ownership());
        assert!(!HandleType::OpaqueWin32Kmt.requires_close());
    }

    #[test]
    fn import_desc_size_check() {
        let desc = ImportDesc {
            extent: Extent2D::square(128),
            format: PixelFormat::Rgba8Unorm,
            allocation_size: 65_536,
            handle_type: HandleType::OpaqueFd,
        };
        assert!(desc.size_is_sufficient());

        let short = ImportDesc {
            allocation_size: 65_535,
            ..desc
        };
        assert!(!short.size_is_sufficient());
    }
}

//! Shared vocabulary for the vkgl workspace.
//!
//! This crate holds the types that cross the Vulkan / OpenGL boundary:
//! - Image extent and pixel format
//! - Native handle types and the owned [`NativeMemoryHandle`]
//! - The [`ImportDesc`] handed from exporter to importer
//! - The per-chain [`ResourceState`] machine
//! - Fill patterns

pub mod error;
pub mod handle;
pub mod pattern;
pub mod state;
pub mod types;

pub use error::{Error, Result};
pub use handle::{NativeMemoryHandle, RawNativeHandle};
pub use pattern::Pattern;
pub use state::ResourceState;
pub use types::{Extent2D, HandleType, ImportDesc, PixelFormat};

/// Workspace-wide constants
pub mod constants {
    /// Edge length of the demo image in texels
    pub const DEFAULT_IMAGE_SIZE: u32 = 128;
    /// Khronos validation layer name
    pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
    /// Application name reported to the driver
    pub const APP_NAME: &str = "vkgl";
}

//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// Instance or device setup failed.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// The selected device has no queue family with graphics support.
    #[error("No graphics-capable queue family on {device}")]
    NoGraphicsQueue { device: String },

    /// No memory type satisfies both the resource and the property request.
    #[error("No suitable memory type (type bits {type_bits:#b}, required {required:?})")]
    NoSuitableMemoryType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },

    /// An entry point was used before it was resolved, or could not be resolved.
    #[error("Function not loaded: {0}")]
    FunctionNotLoaded(&'static str),

    /// Image or memory object could not be created with the requested parameters.
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// Export and import declarations disagree.
    #[error("Export/import mismatch: {0}")]
    ExportImportMismatch(String),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Error from the shared vocabulary types.
    #[error(transparent)]
    Core(#[from] vkgl_core::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

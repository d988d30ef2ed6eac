//! OpenGL error types.

use thiserror::Error;

/// OpenGL-side errors.
#[derive(Error, Debug)]
pub enum GlError {
    /// An extension entry point was used before it was resolved, or could not be resolved.
    #[error("Function not loaded: {0}")]
    FunctionNotLoaded(&'static str),

    /// `glGetError` reported an error after a call.
    #[error("{call} failed with GL error {code:#06x}")]
    Gl { call: &'static str, code: u32 },

    /// Texture or memory object creation failed.
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// The import description disagrees with the handle or the texture.
    #[error("Export/import mismatch: {0}")]
    ExportImportMismatch(String),

    /// Error from the shared vocabulary types.
    #[error(transparent)]
    Core(#[from] vkgl_core::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GlError>;

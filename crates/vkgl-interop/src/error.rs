//! Errors for the full Vulkan to GL chain.

use thiserror::Error;
use vkgl_gl::GlError;
use vkgl_gpu::GpuError;

/// Failure classes shared by both sides of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Initialization,
    NoGraphicsQueue,
    NoSuitableMemoryType,
    FunctionNotLoaded,
    ResourceCreation,
    ExportImportMismatch,
}

/// Errors raised while building or using an interop chain.
#[derive(Error, Debug)]
pub enum InteropError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Gl(#[from] GlError),

    #[error(transparent)]
    Core(#[from] vkgl_core::Error),
}

impl InteropError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Gpu(e) => gpu_kind(e),
            Self::Gl(e) => gl_kind(e),
            Self::Core(e) => core_kind(e),
        }
    }
}

fn gpu_kind(error: &GpuError) -> ErrorKind {
    match error {
        GpuError::Initialization(_) | GpuError::ExtensionNotSupported(_) => {
            ErrorKind::Initialization
        }
        GpuError::NoGraphicsQueue { .. } => ErrorKind::NoGraphicsQueue,
        GpuError::NoSuitableMemoryType { .. } => ErrorKind::NoSuitableMemoryType,
        GpuError::FunctionNotLoaded(_) => ErrorKind::FunctionNotLoaded,
        GpuError::ExportImportMismatch(_) => ErrorKind::ExportImportMismatch,
        GpuError::Vulkan(_)
        | GpuError::ResourceCreation(_)
        | GpuError::AllocationFailed(_)
        | GpuError::InvalidState(_) => ErrorKind::ResourceCreation,
        GpuError::Core(e) => core_kind(e),
    }
}

fn gl_kind(error: &GlError) -> ErrorKind {
    match error {
        GlError::FunctionNotLoaded(_) => ErrorKind::FunctionNotLoaded,
        // GL reports a rejected import only through glGetError.
        GlError::Gl { .. } | GlError::ExportImportMismatch(_) => ErrorKind::ExportImportMismatch,
        GlError::ResourceCreation(_) => ErrorKind::ResourceCreation,
        GlError::Core(e) => core_kind(e),
    }
}

fn core_kind(error: &vkgl_core::Error) -> ErrorKind {
    match error {
        vkgl_core::Error::HandleConsumed | vkgl_core::Error::UnknownHandleType(_) => {
            ErrorKind::ExportImportMismatch
        }
        vkgl_core::Error::UnknownPixelFormat(_) => ErrorKind::Initialization,
        vkgl_core::Error::Io(_)
        | vkgl_core::Error::InvalidTransition { .. }
        | vkgl_core::Error::InvalidExtent { .. } => ErrorKind::ResourceCreation,
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, InteropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        let cases: Vec<(InteropError, ErrorKind)> = vec![
            (
                GpuError::Initialization("no layer".into()).into(),
                ErrorKind::Initialization,
            ),
            (
                GpuError::NoGraphicsQueue {
                    device: "gpu".into(),
                }
                .into(),
                ErrorKind::NoGraphicsQueue,
            ),
            (
                GpuError::FunctionNotLoaded("vkGetMemoryFdKHR").into(),
                ErrorKind::FunctionNotLoaded,
            ),
            (
                GlError::Gl {
                    call: "glImportMemoryFdEXT",
                    code: 0x0502,
                }
                .into(),
                ErrorKind::ExportImportMismatch,
            ),
            (
                vkgl_core::Error::InvalidExtent {
                    width: 0,
                    height: 1,
                }
                .into(),
                ErrorKind::ResourceCreation,
            ),
        ];
        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "{error}");
        }
    }
}

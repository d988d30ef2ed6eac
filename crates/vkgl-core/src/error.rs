//! Error types shared by every vkgl crate.

use thiserror::Error;

use crate::state::ResourceState;

/// Errors raised by the shared vocabulary types.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A resource chain was asked to move backwards or skip a step.
    #[error("Invalid resource transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ResourceState,
        to: ResourceState,
    },

    /// A handle type name that does not match any known handle type.
    #[error("Unknown handle type: {0}")]
    UnknownHandleType(String),

    /// A pixel format name that does not match any known format.
    #[error("Unknown pixel format: {0}")]
    UnknownPixelFormat(String),

    /// Zero-sized or otherwise unusable image extent.
    #[error("Invalid extent: {width}x{height}")]
    InvalidExtent { width: u32, height: u32 },

    /// A native handle was used after it was handed to an importer.
    #[error("Native handle already consumed")]
    HandleConsumed,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

//! Vulkan image to GL texture sharing, end to end.
//!
//! [`InteropChain`] drives `vkgl-gpu` and `vkgl-gl` through the full
//! create, allocate, bind, export, import sequence and owns the result.

pub mod chain;
pub mod error;

pub use chain::{ChainDesc, InitialFill, InteropChain};
pub use error::{ErrorKind, InteropError, Result};

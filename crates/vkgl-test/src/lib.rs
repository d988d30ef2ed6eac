//! Test support for vkgl.
//!
//! Provides an in-memory Vulkan driver and GL backend that share a model of
//! device memory, fixtures that wire them into full chains, and image
//! comparison helpers.

pub mod harness;
pub mod mock;

#[cfg(test)]
mod scenarios;

pub use harness::{compare_images, to_image, HeadlessExport, MockHarness, RgbaImage};
pub use mock::{MockDeviceSpec, MockEvent, MockGl, MockLoader, MockWorld};

use thiserror::Error;
use vkgl_interop::InteropError;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("GPU error: {0}")]
    Gpu(String),
    #[error("Image comparison failed: {0}")]
    ImageComparison(String),
    #[error(transparent)]
    Interop(#[from] InteropError),
}

pub type Result<T> = std::result::Result<T, TestError>;

//! Mock Vulkan driver and GL backend over a shared in-memory world.

mod driver;
mod gl;
mod world;

pub use driver::{queue_family, MockDevice, MockDeviceSpec, MockExport, MockInstance, MockLoader};
pub use gl::MockGl;
pub use world::{LiveCounts, MockEvent, MockWorld};

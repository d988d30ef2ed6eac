//! Viewer application for vkgl.
//!
//! Opens a GL window, shares one Vulkan image with it and draws the result
//! with ImGui, alongside a filterable list of the GPU's device extensions.
//!
//! # Example
//!
//! ```no_run
//! use vkgl_app::{run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::new("vkgl demo").with_size(1280, 720))
//! }
//! ```

mod cli;
mod input;
mod runner;
mod ui;

pub use cli::{parse_args, CliAction};
pub use runner::{run_app, AppConfig};
pub use ui::{filter_extensions, ExtensionPanel};

// Re-export commonly used types for convenience
pub use vkgl_core::{Extent2D, HandleType, Pattern};
pub use vkgl_gpu::SelectionStrategy;

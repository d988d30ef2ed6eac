//! OpenGL side of the vkgl memory sharing chain.
//!
//! Imports memory exported by `vkgl-gpu` through `GL_EXT_memory_object` and
//! exposes it as an ordinary 2D texture.

pub mod backend;
pub mod error;
pub mod ext;
pub mod importer;

pub use imgui_glow_renderer::glow;

pub use backend::{GlBackend, GlMemoryObject, GlTexture, GlowBackend};
pub use error::{GlError, Result};
pub use ext::MemoryObjectFns;
pub use importer::{ImportedTexture, PlaceholderTexture, TextureImporter};

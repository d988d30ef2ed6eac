//! Platform layer for vkgl.
//!
//! Creates a winit window with a current OpenGL 4.5 core context (via glutin)
//! that the UI renderer and the texture importer draw into.

use std::ffi::{c_void, CStr};
use std::num::NonZeroU32;

use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext,
    Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow as _};
use raw_window_handle::HasWindowHandle;
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
    #[error("OpenGL context error: {0}")]
    GlContext(String),
}

impl From<glutin::error::Error> for PlatformError {
    fn from(e: glutin::error::Error) -> Self {
        Self::GlContext(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Requested OpenGL context version.
pub const GL_VERSION: (u8, u8) = (4, 5);

/// Platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub vsync: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "vkgl".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
            vsync: true,
        }
    }
}

/// A window together with its current GL context and surface.
///
/// Fields drop in declaration order so the surface and context go away
/// before the native window.
pub struct GlWindow {
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    window: Window,
}

impl GlWindow {
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Current framebuffer size in physical pixels.
    pub fn size(&self) -> PhysicalSize<u32> {
        self.window.inner_size()
    }

    /// Present the back buffer.
    pub fn swap_buffers(&self) -> Result<()> {
        self.surface.swap_buffers(&self.context)?;
        Ok(())
    }

    /// Resize the GL surface. Zero-sized requests (minimized windows) are ignored.
    pub fn resize(&self, width: u32, height: u32) {
        if let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) {
            self.surface.resize(&self.context, w, h);
        }
    }

    /// Look up a GL entry point in the current context.
    pub fn get_proc_address(&self, name: &CStr) -> *const c_void {
        self.context.display().get_proc_address(name)
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    // Prefer plain single-sampled configs with alpha; the imported texture is
    // drawn by the UI and needs no multisampling.
    configs
        .reduce(|best, candidate| {
            let better_alpha = candidate.alpha_size() > best.alpha_size();
            let fewer_samples = candidate.num_samples() < best.num_samples();
            if fewer_samples || (candidate.num_samples() == best.num_samples() && better_alpha) {
                candidate
            } else {
                best
            }
        })
        .expect("glutin always offers at least one config to the picker")
}

/// Create a window and make a GL 4.5 core context current on it.
pub fn create_gl_window(event_loop: &ActiveEventLoop, config: &PlatformConfig) -> Result<GlWindow> {
    let window_attrs = Window::default_attributes()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(config.resizable);

    let template = ConfigTemplateBuilder::new().with_alpha_size(8);
    let (window, gl_config) = DisplayBuilder::new()
        .with_window_attributes(Some(window_attrs.clone()))
        .build(event_loop, template, pick_config)
        .map_err(|e| PlatformError::GlContext(e.to_string()))?;

    debug!(
        "Selected GL config: {} samples, alpha {}",
        gl_config.num_samples(),
        gl_config.alpha_size()
    );

    let window = match window {
        Some(window) => window,
        None => glutin_winit::finalize_window(event_loop, window_attrs, &gl_config)
            .map_err(|e| PlatformError::WindowCreation(e.to_string()))?,
    };

    let raw_window_handle = window
        .window_handle()
        .map_err(|e| PlatformError::WindowCreation(e.to_string()))?
        .as_raw();

    let (major, minor) = GL_VERSION;
    let context_attrs = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(major, minor))))
        .with_profile(GlProfile::Core)
        .build(Some(raw_window_handle));

    let gl_display = gl_config.display();
    // SAFETY: the raw window handle belongs to `window`, which outlives the
    // context in `GlWindow`.
    let not_current = unsafe { gl_display.create_context(&gl_config, &context_attrs)? };

    let surface_attrs = window
        .build_surface_attributes(SurfaceAttributesBuilder::default())
        .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;
    // SAFETY: as above, the surface is dropped before the window.
    let surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attrs)? };
    let context = not_current.make_current(&surface)?;

    let interval = if config.vsync {
        SwapInterval::Wait(NonZeroU32::MIN)
    } else {
        SwapInterval::DontWait
    };
    if let Err(e) = surface.set_swap_interval(&context, interval) {
        warn!("Failed to set swap interval: {e}");
    }

    info!(
        "Created {}x{} window with OpenGL {major}.{minor} core context",
        config.width, config.height
    );

    Ok(GlWindow {
        surface,
        context,
        window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_viewer_window() {
        let config = PlatformConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(config.vsync);
    }

    #[test]
    fn context_errors_are_reported_as_gl_context() {
        let err: PlatformError =
            glutin::error::Error::from(glutin::error::ErrorKind::NotSupported("test")).into();
        assert!(matches!(err, PlatformError::GlContext(_)));
    }
}

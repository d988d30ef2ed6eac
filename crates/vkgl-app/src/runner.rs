//! Application runner and event loop.

use std::ffi::CString;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use anyhow::anyhow;
use imgui_glow_renderer::{Renderer, SimpleTextureMap};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vkgl_core::{constants, Extent2D, HandleType, Pattern, PixelFormat};
use vkgl_gl::glow::{self, HasContext};
use vkgl_gl::{GlBackend, GlowBackend, TextureImporter};
use vkgl_gpu::{GpuContext, GpuContextBuilder, HandleExporter, SelectionStrategy};
use vkgl_interop::{ChainDesc, InteropChain};
use vkgl_platform::{create_gl_window, GlWindow, PlatformConfig, PlatformError};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::input::handle_window_event;
use crate::ui::{draw_device_window, draw_image_window, ExtensionPanel};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Size of the shared Vulkan image.
    pub image_size: Extent2D,
    pub format: PixelFormat,
    /// Native handle type used to share memory.
    pub handle_type: HandleType,
    /// Contents written into the image before import.
    pub pattern: Pattern,
    /// How the GPU is chosen.
    pub strategy: SelectionStrategy,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Enable vsync.
    pub vsync: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "vkgl".to_string(),
            width: 1280,
            height: 720,
            image_size: Extent2D::square(constants::DEFAULT_IMAGE_SIZE),
            format: PixelFormat::default(),
            handle_type: HandleType::platform_default(),
            pattern: Pattern::default(),
            strategy: SelectionStrategy::default(),
            validation: cfg!(debug_assertions),
            vsync: true,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the shared image dimensions.
    pub fn with_image_size(mut self, extent: Extent2D) -> Self {
        self.image_size = extent;
        self
    }

    pub fn with_handle_type(mut self, handle_type: HandleType) -> Self {
        self.handle_type = handle_type;
        self
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: true,
            vsync: self.vsync,
        }
    }
}

/// Run the viewer with the given configuration.
///
/// Initializes logging, opens the GL window, builds the Vulkan context and
/// the shared image, then runs the event loop until the window is closed.
/// A failure while setting up is logged and returned.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting {} ({} image, {} handles)",
        config.title, config.image_size, config.handle_type
    );

    let event_loop = EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        state: None,
        init_error: None,
    };

    event_loop
        .run_app(&mut runner)
        .map_err(|e| PlatformError::EventLoop(e.to_string()))?;

    match runner.init_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct AppRunner {
    config: AppConfig,
    state: Option<AppState>,
    init_error: Option<anyhow::Error>,
}

/// Everything alive while the window is open.
///
/// Declaration order is drop order: the chain releases its GL and Vulkan
/// objects while both contexts still exist, and the window (owning the GL
/// context) goes last.
struct AppState {
    chain: InteropChain,
    gpu: GpuContext,
    extensions: ExtensionPanel,
    renderer: Renderer,
    texture_map: SimpleTextureMap,
    imgui: imgui::Context,
    gl: Rc<glow::Context>,
    window: GlWindow,
    last_frame: Instant,
    started: Instant,
    frame_count: u64,
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating window, GL context and interop chain");

        match create_state(&self.config, event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Shared texture ready");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.init_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(state) = &mut self.state {
            let scale = state.window.window().scale_factor();
            handle_window_event(state.imgui.io_mut(), &event, scale);
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.render_frame() {
                        error!("Render error: {e:#}");
                    }
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &self.state {
                    state.window.resize(size.width, size.height);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

fn create_state(config: &AppConfig, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
    let window = create_gl_window(event_loop, &config.platform())?;

    // SAFETY: the context of `window` is current on this thread and stays
    // alive for as long as `gl`.
    let gl = Rc::new(unsafe {
        glow::Context::from_loader_function(|name| {
            CString::new(name).map_or(std::ptr::null(), |name| window.get_proc_address(&name))
        })
    });
    // SAFETY: same context as `gl`.
    let backend =
        Rc::new(unsafe { GlowBackend::new(Rc::clone(&gl), |name| window.get_proc_address(name)) });

    let gl_extension = config.handle_type.gl_extension();
    if !backend.supports_extension(gl_extension) {
        warn!("GL context does not advertise {gl_extension}; the import will fail");
    }

    let gpu = GpuContextBuilder::new()
        .app_name(&config.title)
        .validation(config.validation)
        .strategy(config.strategy.clone())
        .handle_type(config.handle_type)
        .build()?;

    info!("GPU: {}", gpu.physical_device.summary());

    let mut exporter = HandleExporter::new(gpu.handle_type);
    exporter.load(&gpu.device)?;

    let importer = TextureImporter::new(backend);
    let desc = ChainDesc::new(config.image_size, gpu.handle_type)
        .with_format(config.format)
        .with_pattern(config.pattern);
    let chain = InteropChain::build(&gpu.device, &exporter, &importer, &desc)?;

    let mut imgui = imgui::Context::create();
    imgui.set_ini_filename(None::<PathBuf>);
    let mut texture_map = SimpleTextureMap::default();
    let renderer = Renderer::initialize(&gl, &mut imgui, &mut texture_map, false)
        .map_err(|e| anyhow!("Failed to initialize ImGui renderer: {e:?}"))?;

    let extensions = ExtensionPanel::new(gpu.physical_device.extensions.clone());

    let now = Instant::now();
    Ok(AppState {
        chain,
        gpu,
        extensions,
        renderer,
        texture_map,
        imgui,
        gl,
        window,
        last_frame: now,
        started: now,
        frame_count: 0,
    })
}

impl AppState {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let size = self.window.size();
        let scale = self.window.window().scale_factor();

        let io = self.imgui.io_mut();
        io.update_delta_time(now - self.last_frame);
        self.last_frame = now;
        let logical = size.to_logical::<f32>(scale);
        io.display_size = [logical.width, logical.height];
        io.display_framebuffer_scale = [scale as f32, scale as f32];

        let ui = self.imgui.new_frame();
        draw_image_window(ui, &self.chain);
        draw_device_window(ui, &self.gpu.physical_device, &self.chain);
        self.extensions.draw(ui);
        let draw_data = self.imgui.render();

        unsafe {
            self.gl.viewport(0, 0, size.width as i32, size.height as i32);
            self.gl.clear_color(0.1, 0.1, 0.12, 1.0);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
        self.renderer
            .render(&self.gl, &self.texture_map, draw_data)
            .map_err(|e| anyhow!("ImGui render failed: {e:?}"))?;
        self.window.swap_buffers()?;

        self.chain.mark_displayed()?;
        self.frame_count += 1;
        Ok(())
    }

    fn cleanup(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        if self.frame_count > 0 && elapsed > 0.0 {
            info!(
                "Rendered {} frames ({:.1} fps average)",
                self.frame_count,
                self.frame_count as f64 / elapsed
            );
        }

        info!("Releasing shared image");
        if let Err(e) = self.gpu.device.wait_idle() {
            error!("Device did not go idle before teardown: {e}");
        }

        self.chain.destroy();
        self.renderer.destroy(&self.gl);

        info!("Shared image released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_shares_a_128_square_image() {
        let config = AppConfig::default();
        assert_eq!(config.image_size, Extent2D::square(128));
        assert_eq!(config.handle_type, HandleType::platform_default());
        assert_eq!(config.validation, cfg!(debug_assertions));
    }

    #[test]
    fn builder_setters_apply() {
        let config = AppConfig::new("demo")
            .with_size(800, 600)
            .with_image_size(Extent2D::new(64, 32))
            .with_pattern(Pattern::Gradient)
            .with_validation(false);
        assert_eq!(config.title, "demo");
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.image_size, Extent2D::new(64, 32));
        assert_eq!(config.pattern, Pattern::Gradient);
        assert!(!config.validation);
        assert_eq!(config.platform().width, 800);
    }
}

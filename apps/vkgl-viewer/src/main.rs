//! vkgl viewer
//!
//! Allocates a Vulkan image in exportable memory, fills it, exports the memory
//! as a native handle, imports it into an OpenGL texture and shows that
//! texture in an ImGui window. A second window lists the device extensions of
//! the selected GPU.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vkgl-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! ### Image options
//! - `--size <N>`: Square image edge in texels (default: 128)
//! - `--width <N>`, `--height <N>`: Image dimensions
//! - `--pattern <NAME>`: `solid`, `checker`, `gradient` or `none` (default: solid)
//!
//! ### Device options
//! - `--device <INDEX|NAME>`: Pick a GPU by index or name substring
//! - `--prefer-discrete`: Prefer a discrete GPU
//! - `--handle-type <TYPE>`: `fd`, `win32` or `win32-kmt`
//! - `--validation`, `--no-validation`: Toggle the Khronos validation layer
//!
//! ### Other
//! - `--vsync`, `--no-vsync`: Toggle vsync
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use vkgl_app::{parse_args, run_app, AppConfig, CliAction};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let base = AppConfig::new("vkgl - Vulkan to OpenGL").with_size(WIDTH, HEIGHT);

    match parse_args(&args, base)? {
        CliAction::Help => {
            print_help();
            Ok(())
        }
        CliAction::Run(config) => run_app(config),
    }
}

fn print_help() {
    eprintln!(
        "vkgl viewer: a Vulkan image shown through an OpenGL texture

USAGE:
    cargo run -p vkgl-viewer -- [OPTIONS]

IMAGE OPTIONS:
    --size <N>              Square image edge in texels (default: 128)
    --width <N>             Image width in texels
    --height <N>            Image height in texels
    --pattern <NAME>        Fill written before import: solid, checker,
                            gradient or none (default: solid)

DEVICE OPTIONS:
    --device <INDEX|NAME>   GPU by enumeration index or name substring
                            Default: first enumerated device
    --prefer-discrete       First discrete GPU, else the first device
    --handle-type <TYPE>    fd, win32 or win32-kmt
                            Default: fd on Unix, win32 on Windows
    --validation            Enable VK_LAYER_KHRONOS_validation
    --no-validation         Disable it (default in release builds)

OTHER:
    --vsync / --no-vsync    Toggle vsync (default: on)
    -h, --help              Print this help message

EXAMPLES:
    # 128x128 red square on the default GPU
    cargo run -p vkgl-viewer

    # Larger checkerboard on a discrete GPU
    cargo run -p vkgl-viewer -- --size 512 --pattern checker --prefer-discrete

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}

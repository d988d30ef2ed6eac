//! Command line parsing for the viewer.

use anyhow::{anyhow, bail, Context as _};
use vkgl_core::{Extent2D, HandleType, Pattern};
use vkgl_gpu::{DeviceType, SelectionStrategy};

use crate::runner::AppConfig;

/// What the command line asked for.
#[derive(Debug, Clone)]
pub enum CliAction {
    Run(AppConfig),
    Help,
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{flag} expects a value"))
}

fn parse_dimension(raw: &str, flag: &str) -> anyhow::Result<u32> {
    let v: u32 = raw
        .parse()
        .with_context(|| format!("{flag}: '{raw}' is not a number"))?;
    if v == 0 {
        bail!("{flag} must be greater than zero");
    }
    Ok(v)
}

/// Parse `args` (including the program name at index 0) on top of `base`.
///
/// Recognizes:
/// - `--size <N>`: square shared image edge
/// - `--width <N>` / `--height <N>`: shared image dimensions
/// - `--device <INDEX|NAME>`: GPU by enumeration index or name substring
/// - `--prefer-discrete`: first discrete GPU, falling back to device 0
/// - `--handle-type <fd|win32|win32-kmt>`
/// - `--pattern <solid|checker|gradient|none>`
/// - `--validation` / `--no-validation`
/// - `--vsync` / `--no-vsync`
/// - `-h` or `--help`
pub fn parse_args(args: &[String], base: AppConfig) -> anyhow::Result<CliAction> {
    let mut config = base;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-h" | "--help" => return Ok(CliAction::Help),
            "--size" => {
                let size = parse_dimension(value(args, i, flag)?, flag)?;
                config.image_size = Extent2D::square(size);
                i += 1;
            }
            "--width" => {
                config.image_size.width = parse_dimension(value(args, i, flag)?, flag)?;
                i += 1;
            }
            "--height" => {
                config.image_size.height = parse_dimension(value(args, i, flag)?, flag)?;
                i += 1;
            }
            "--device" => {
                let raw = value(args, i, flag)?;
                config.strategy = match raw.parse::<usize>() {
                    Ok(index) => SelectionStrategy::Index(index),
                    Err(_) => SelectionStrategy::NameContains(raw.to_string()),
                };
                i += 1;
            }
            "--prefer-discrete" => {
                config.strategy = SelectionStrategy::PreferType(DeviceType::Discrete);
            }
            "--handle-type" => {
                config.handle_type = value(args, i, flag)?.parse::<HandleType>()?;
                i += 1;
            }
            "--pattern" => {
                let raw = value(args, i, flag)?;
                config.pattern =
                    Pattern::from_name(raw).ok_or_else(|| anyhow!("Unknown pattern: {raw}"))?;
                i += 1;
            }
            "--validation" => config.validation = true,
            "--no-validation" => config.validation = false,
            "--vsync" => config.vsync = true,
            "--no-vsync" => config.vsync = false,
            other => bail!("Unknown argument: {other} (see --help)"),
        }
        i += 1;
    }

    Ok(CliAction::Run(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("vkgl-viewer")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    fn run(list: &[&str]) -> AppConfig {
        match parse_args(&args(list), AppConfig::default()).unwrap() {
            CliAction::Run(config) => config,
            CliAction::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn no_arguments_keep_defaults() {
        let config = run(&[]);
        assert_eq!(config.image_size, Extent2D::square(128));
        assert_eq!(config.pattern, Pattern::Solid);
        assert!(matches!(config.strategy, SelectionStrategy::First));
    }

    #[test]
    fn size_then_width_override() {
        let config = run(&["--size", "256", "--width", "64"]);
        assert_eq!(config.image_size, Extent2D::new(64, 256));
    }

    #[test]
    fn device_accepts_index_or_name() {
        assert!(matches!(
            run(&["--device", "1"]).strategy,
            SelectionStrategy::Index(1)
        ));
        match run(&["--device", "NVIDIA"]).strategy {
            SelectionStrategy::NameContains(name) => assert_eq!(name, "NVIDIA"),
            other => panic!("unexpected strategy {other:?}"),
        }
        assert!(matches!(
            run(&["--prefer-discrete"]).strategy,
            SelectionStrategy::PreferType(DeviceType::Discrete)
        ));
    }

    #[test]
    fn toggles_and_enums() {
        let config = run(&[
            "--handle-type",
            "win32-kmt",
            "--pattern",
            "checker",
            "--no-validation",
            "--no-vsync",
        ]);
        assert_eq!(config.handle_type, HandleType::OpaqueWin32Kmt);
        assert_eq!(config.pattern, Pattern::Checkerboard);
        assert!(!config.validation);
        assert!(!config.vsync);
    }

    #[test]
    fn help_short_circuits() {
        let action = parse_args(&args(&["--size", "64", "-h"]), AppConfig::default()).unwrap();
        assert!(matches!(action, CliAction::Help));
    }

    #[test]
    fn bad_values_are_errors() {
        let base = AppConfig::default;
        assert!(parse_args(&args(&["--size", "0"]), base()).is_err());
        assert!(parse_args(&args(&["--size"]), base()).is_err());
        assert!(parse_args(&args(&["--pattern", "stripes"]), base()).is_err());
        assert!(parse_args(&args(&["--handle-type", "dmabuf"]), base()).is_err());
        assert!(parse_args(&args(&["--frobnicate"]), base()).is_err());
    }
}

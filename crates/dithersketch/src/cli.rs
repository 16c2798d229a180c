use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::{Antialiasing, ColorSpaceMode, ShaderCompiler};

#[derive(Parser, Debug)]
#[command(
    name = "dithersketch",
    author,
    version,
    about = "Full-window ordered and blue-noise dithering sketch",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the sketch window (the default when no subcommand is given).
    Run(RunArgs),
    /// Generate the Bayer and blue-noise threshold textures.
    Textures(TexturesArgs),
    /// Write a ready-to-run sketch pack: manifest, shaders, and textures.
    Init(InitArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Sketch pack directory holding `sketch.toml`, the shaders, and images.
    #[arg(
        value_name = "PACK",
        env = "DITHERSKETCH_PACK",
        default_value = "sketch"
    )]
    pub pack: PathBuf,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Target frame rate; overrides the manifest.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Freeze `u_time` at this many seconds instead of following the clock.
    #[arg(long, value_name = "SECONDS")]
    pub time: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(
        long,
        value_name = "MODE",
        value_parser = parse_antialias,
        default_value = "auto"
    )]
    pub antialias: Antialiasing,

    /// Shader compiler backend: `shaderc` or `naga`.
    #[arg(
        long,
        value_name = "COMPILER",
        value_parser = parse_shader_compiler,
        default_value_t = ShaderCompiler::default()
    )]
    pub shader_compiler: ShaderCompiler,

    /// Output color space handling: `auto`, `gamma`, or `linear`; overrides the manifest.
    #[arg(long, value_name = "MODE", value_parser = parse_color_space)]
    pub color_space: Option<ColorSpaceMode>,

    /// Directory snapshots are written into.
    #[arg(long, value_name = "DIR", env = "DITHERSKETCH_SNAPSHOT_DIR")]
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct TexturesArgs {
    /// Directory the PNGs are written into.
    #[arg(value_name = "DIR", default_value = "sketch/images")]
    pub dir: PathBuf,

    /// Seed for the blue-noise initial point set.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// List the files that would be written without generating them.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Directory the sketch pack is created in.
    #[arg(value_name = "DIR", default_value = "sketch")]
    pub dir: PathBuf,

    /// Overwrite an existing manifest and shaders.
    #[arg(long)]
    pub force: bool,

    /// Seed for the blue-noise texture.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" => Ok(Antialiasing::Auto),
        "off" | "none" | "0" | "1" => Ok(Antialiasing::Off),
        _ => {
            let samples: u32 = normalized.parse().map_err(|_| {
                format!("invalid anti-alias sample count '{trimmed}'; use auto/off or 2/4/8/16")
            })?;
            if !matches!(samples, 2 | 4 | 8 | 16) {
                return Err(format!(
                    "unsupported sample count {samples}; supported values are 2, 4, 8, or 16"
                ));
            }
            Ok(Antialiasing::Samples(samples))
        }
    }
}

pub fn parse_shader_compiler(value: &str) -> Result<ShaderCompiler, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Err("shader compiler must not be empty".to_string()),
        "shaderc" => {
            if cfg!(feature = "shaderc") {
                Ok(ShaderCompiler::Shaderc)
            } else {
                Err("shaderc support is not enabled in this build".to_string())
            }
        }
        "naga" | "naga-glsl" => Ok(ShaderCompiler::NagaGlsl),
        _ => Err("unknown shader compiler (expected shaderc or naga)".to_string()),
    }
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Err("color space must not be empty".to_string()),
        "auto" => Ok(ColorSpaceMode::Auto),
        "gamma" => Ok(ColorSpaceMode::Gamma),
        "linear" | "srgb" => Ok(ColorSpaceMode::Linear),
        other => Err(format!(
            "unknown color space '{other}'; expected auto, gamma, or linear"
        )),
    }
}

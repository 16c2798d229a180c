use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use renderer::{ColorSpaceMode, RendererConfig, SketchSettings, TextureBinding};
use sketchpack::{ColorSpace, LocalSketch};

use crate::cli::RunArgs;

pub fn parse_surface_size(value: &str) -> Result<(u32, u32)> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow!("expected WxH format, e.g. 1280x720"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        bail!("surface dimensions must be greater than zero");
    }

    Ok((width, height))
}

pub fn map_manifest_color(color_space: ColorSpace) -> ColorSpaceMode {
    match color_space {
        ColorSpace::Auto => ColorSpaceMode::Auto,
        ColorSpace::Gamma => ColorSpaceMode::Gamma,
        ColorSpace::Linear => ColorSpaceMode::Linear,
    }
}

/// Combines the pack manifest with command-line overrides.
pub fn build_renderer_config(args: &RunArgs, pack: &LocalSketch) -> Result<RendererConfig> {
    let manifest = pack.manifest();
    let defaults = RendererConfig::default();

    let frame_rate = match args.fps {
        Some(fps) if !fps.is_finite() || fps <= 0.0 => {
            bail!("--fps must be a positive number (got {fps})")
        }
        Some(fps) => fps,
        None => manifest.frame_rate,
    };
    if let Some(time) = args.time {
        if !time.is_finite() || time < 0.0 {
            bail!("--time must be a non-negative number of seconds (got {time})");
        }
    }

    let surface_size = match args.size.as_deref() {
        Some(size) => parse_surface_size(size)?,
        None => defaults.surface_size,
    };

    let sketch = SketchSettings {
        vertex_shader: pack.vertex_path(),
        fragment_shader: pack.fragment_path(),
        textures: pack
            .textures()
            .map(|(uniform, path)| TextureBinding::new(uniform, path))
            .collect(),
        frame_rate,
        background: manifest.background,
        snapshot_key: manifest.snapshot_key,
    };

    Ok(RendererConfig {
        title: manifest.name.clone().unwrap_or(defaults.title),
        surface_size,
        sketch,
        antialiasing: args.antialias,
        shader_compiler: args.shader_compiler,
        color_space: args
            .color_space
            .unwrap_or_else(|| map_manifest_color(manifest.color_space)),
        snapshot_dir: args
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
        fixed_time: args.time,
    })
}

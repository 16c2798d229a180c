use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use tracing::info;

use crate::{bayer_matrix, blue_noise, BlueNoiseConfig, DitherError, DEFAULT_SIGMA};

/// One of the threshold textures the bundled sketch expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTexture {
    /// Uniform the texture is bound to in the shader.
    pub uniform: &'static str,
    /// File name relative to the texture directory.
    pub file_name: &'static str,
    pub size: u32,
    pub kind: PatternKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Bayer,
    BlueNoise,
}

pub const DEFAULT_TEXTURES: [DefaultTexture; 3] = [
    DefaultTexture {
        uniform: "bayer8x8",
        file_name: "bayer8.png",
        size: 8,
        kind: PatternKind::Bayer,
    },
    DefaultTexture {
        uniform: "bayer16x16",
        file_name: "bayer16.png",
        size: 16,
        kind: PatternKind::Bayer,
    },
    DefaultTexture {
        uniform: "blueNoise64x64",
        file_name: "blue_noise64.png",
        size: 64,
        kind: PatternKind::BlueNoise,
    },
];

impl DefaultTexture {
    /// Looks up the built-in texture bound to `uniform`.
    pub fn for_uniform(uniform: &str) -> Option<Self> {
        DEFAULT_TEXTURES
            .into_iter()
            .find(|texture| texture.uniform == uniform)
    }

    /// Produces the rank grid for this texture.
    pub fn ranks(&self, seed: u64) -> Result<Vec<u32>, DitherError> {
        match self.kind {
            PatternKind::Bayer => bayer_matrix(self.size),
            PatternKind::BlueNoise => blue_noise(BlueNoiseConfig {
                size: self.size,
                sigma: DEFAULT_SIGMA,
                seed,
            }),
        }
    }

    /// Generates the texture and writes it to `path` as a grayscale PNG.
    pub fn write_png(&self, path: &Path, seed: u64) -> Result<(), DitherError> {
        let ranks = self.ranks(seed)?;
        save_png(&ranks, self.size, path)?;
        info!(
            uniform = self.uniform,
            size = self.size,
            path = %path.display(),
            "wrote dither texture"
        );
        Ok(())
    }
}

/// Maps a rank in `0..total` onto the full 8-bit range.
///
/// Rank `r` lands on `floor(r * 256 / total)`, so an `8x8` matrix produces
/// levels `0, 4, 8, .. 252` and the shader recovers the rank by scaling.
pub fn rank_to_luma(rank: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let scaled = (u64::from(rank) * 256) / u64::from(total);
    scaled.min(255) as u8
}

/// Converts a square row-major rank grid into a grayscale image.
pub fn to_luma_image(ranks: &[u32], size: u32) -> Result<GrayImage, DitherError> {
    let expected = (size as usize) * (size as usize);
    if ranks.len() != expected {
        return Err(DitherError::GridMismatch {
            size,
            expected,
            actual: ranks.len(),
        });
    }
    let total = expected as u32;
    let pixels: Vec<u8> = ranks
        .iter()
        .map(|&rank| rank_to_luma(rank, total))
        .collect();
    GrayImage::from_raw(size, size, pixels).ok_or(DitherError::GridMismatch {
        size,
        expected,
        actual: ranks.len(),
    })
}

pub fn save_png(ranks: &[u32], size: u32, path: &Path) -> Result<(), DitherError> {
    let image = to_luma_image(ranks, size)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Writes the three default threshold textures into `dir`.
///
/// Returns the written paths in [`DEFAULT_TEXTURES`] order.
pub fn write_default_textures(dir: &Path, seed: u64) -> Result<Vec<PathBuf>, DitherError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(DEFAULT_TEXTURES.len());
    for texture in DEFAULT_TEXTURES {
        let path = dir.join(texture.file_name);
        texture.write_png(&path, seed)?;
        written.push(path);
    }
    Ok(written)
}

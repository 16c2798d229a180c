//! Threshold-map generators for the dithering sketch.
//!
//! The renderer samples three fixed patterns: two ordered (Bayer) matrices
//! and one blue-noise rank map. This crate produces those patterns as rank
//! grids and writes them out as 8-bit grayscale PNGs the sketch pack loads at
//! start-up.
//!
//! - `bayer` builds recursive ordered-dither matrices for power-of-two sizes.
//! - `blue_noise` runs void-and-cluster over a toroidal grid.
//! - `export` normalises ranks to luma and writes PNG files.

mod bayer;
mod blue_noise;
mod export;

pub use bayer::bayer_matrix;
pub use blue_noise::{blue_noise, BlueNoiseConfig, DEFAULT_SIGMA};
pub use export::{
    rank_to_luma, save_png, to_luma_image, write_default_textures, DefaultTexture, PatternKind,
    DEFAULT_TEXTURES,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DitherError {
    #[error("matrix size {0} must be a power of two between 1 and 256")]
    InvalidBayerSize(u32),

    #[error("blue-noise size {0} must be between 2 and 256")]
    InvalidNoiseSize(u32),

    #[error("blue-noise sigma {0} must be a positive finite number")]
    InvalidSigma(f32),

    #[error("rank grid holds {actual} cells but a {size}x{size} image needs {expected}")]
    GridMismatch {
        size: u32,
        expected: usize,
        actual: usize,
    },

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

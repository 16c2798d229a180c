//! On-disk sketch packs: a directory holding a vertex/fragment shader pair, the
//! textures they sample, and an optional `sketch.toml` manifest.
mod defaults;
mod manifest;
mod pack;

pub use defaults::{
    pack_manifest, write_default_pack, DefaultPackReport, DEFAULT_FRAGMENT_SHADER,
    DEFAULT_VERTEX_SHADER,
};
pub use manifest::{ColorSpace, SketchManifest, TextureEntry, MAX_TEXTURES, RESERVED_UNIFORMS};
pub use pack::{ensure_sources, LocalSketch, PackError, MANIFEST_FILE};

//! Schema for `sketch.toml`, the manifest that sits at the root of a sketch
//! pack. Every field is defaulted so an empty (or absent) manifest describes
//! the stock dithering sketch: `shader.vert`/`shader.frag` plus the three
//! threshold textures under `images/`.
//!
//! Types:
//!
//! - `SketchManifest` holds shader sources, texture bindings, and frame
//!   parameters.
//! - `TextureEntry` pairs a sampler uniform name with an image path.
//! - `ColorSpace` selects how the window surface encodes colour.
//!
//! Functions:
//!
//! - `SketchManifest::validate` returns human-readable issues so loaders can
//!   surface every misconfiguration at once instead of failing on the first.
use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Uniform names the frame driver sets itself. Textures may not shadow them.
pub const RESERVED_UNIFORMS: [&str; 4] = [
    "u_resolution",
    "u_time",
    "uProjectionMatrix",
    "uModelViewMatrix",
];

/// Texture/sampler pairs available to the fragment stage.
pub const MAX_TEXTURES: usize = 8;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SketchManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_vertex")]
    pub vertex: PathBuf,
    #[serde(default = "default_fragment")]
    pub fragment: PathBuf,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    #[serde(default = "default_background")]
    pub background: u8,
    #[serde(default = "default_snapshot_key")]
    pub snapshot_key: char,
    #[serde(default)]
    pub color_space: ColorSpace,
    #[serde(default = "default_textures")]
    pub textures: Vec<TextureEntry>,
}

fn default_vertex() -> PathBuf {
    PathBuf::from("shader.vert")
}

fn default_fragment() -> PathBuf {
    PathBuf::from("shader.frag")
}

fn default_frame_rate() -> f32 {
    30.0
}

fn default_background() -> u8 {
    51
}

fn default_snapshot_key() -> char {
    's'
}

fn default_textures() -> Vec<TextureEntry> {
    vec![
        TextureEntry::new("bayer8x8", "images/bayer8.png"),
        TextureEntry::new("bayer16x16", "images/bayer16.png"),
        TextureEntry::new("blueNoise64x64", "images/blue_noise64.png"),
    ]
}

impl Default for SketchManifest {
    fn default() -> Self {
        Self {
            name: None,
            vertex: default_vertex(),
            fragment: default_fragment(),
            frame_rate: default_frame_rate(),
            background: default_background(),
            snapshot_key: default_snapshot_key(),
            color_space: ColorSpace::default(),
            textures: default_textures(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TextureEntry {
    /// `uniform sampler2D` name in the shader.
    pub uniform: String,
    /// Image path relative to the pack root.
    pub path: PathBuf,
}

impl TextureEntry {
    pub fn new(uniform: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            uniform: uniform.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Auto,
    Gamma,
    Linear,
}

impl SketchManifest {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            issues.push(format!(
                "frame_rate must be a positive number (got {})",
                self.frame_rate
            ));
        }
        if self.vertex.as_os_str().is_empty() {
            issues.push("vertex shader path is empty".to_string());
        }
        if self.fragment.as_os_str().is_empty() {
            issues.push("fragment shader path is empty".to_string());
        }
        if self.snapshot_key.is_control() || self.snapshot_key.is_whitespace() {
            issues.push(format!(
                "snapshot_key {:?} is not a printable character",
                self.snapshot_key
            ));
        }
        if self.textures.len() > MAX_TEXTURES {
            issues.push(format!(
                "{} textures declared but at most {} can be bound",
                self.textures.len(),
                MAX_TEXTURES
            ));
        }

        let mut seen = HashSet::new();
        for texture in &self.textures {
            if !is_identifier(&texture.uniform) {
                issues.push(format!(
                    "texture uniform '{}' is not a valid GLSL identifier",
                    texture.uniform
                ));
            }
            if RESERVED_UNIFORMS.contains(&texture.uniform.as_str()) {
                issues.push(format!(
                    "texture uniform '{}' collides with a built-in uniform",
                    texture.uniform
                ));
            }
            if !seen.insert(texture.uniform.as_str()) {
                issues.push(format!(
                    "texture uniform '{}' is declared more than once",
                    texture.uniform
                ));
            }
            if texture.path.as_os_str().is_empty() {
                issues.push(format!("texture '{}' has an empty path", texture.uniform));
            }
        }
        issues
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_describes_stock_sketch() {
        let manifest: SketchManifest = toml::from_str("").unwrap();
        assert_eq!(manifest, SketchManifest::default());
        assert_eq!(manifest.vertex, PathBuf::from("shader.vert"));
        assert_eq!(manifest.frame_rate, 30.0);
        assert_eq!(manifest.background, 51);
        assert_eq!(manifest.snapshot_key, 's');
        let uniforms: Vec<_> = manifest.textures.iter().map(|t| t.uniform.as_str()).collect();
        assert_eq!(uniforms, ["bayer8x8", "bayer16x16", "blueNoise64x64"]);
        assert!(manifest.validate().is_empty());
    }

    #[test]
    fn parses_overrides() {
        let raw = r#"
            name = "halftone"
            fragment = "halftone.frag"
            frame_rate = 60
            snapshot_key = "p"
            color_space = "linear"

            [[textures]]
            uniform = "pattern"
            path = "pattern.png"
        "#;
        let manifest: SketchManifest = toml::from_str(raw).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("halftone"));
        assert_eq!(manifest.vertex, PathBuf::from("shader.vert"));
        assert_eq!(manifest.fragment, PathBuf::from("halftone.frag"));
        assert_eq!(manifest.frame_rate, 60.0);
        assert_eq!(manifest.snapshot_key, 'p');
        assert_eq!(manifest.color_space, ColorSpace::Linear);
        assert_eq!(manifest.textures, vec![TextureEntry::new("pattern", "pattern.png")]);
    }

    #[test]
    fn reports_every_issue() {
        let manifest = SketchManifest {
            frame_rate: 0.0,
            textures: vec![
                TextureEntry::new("u_time", "a.png"),
                TextureEntry::new("2bad", "b.png"),
                TextureEntry::new("dup", "c.png"),
                TextureEntry::new("dup", ""),
            ],
            ..SketchManifest::default()
        };
        let issues = manifest.validate();
        assert_eq!(issues.len(), 5, "{issues:?}");
        assert!(issues.iter().any(|issue| issue.contains("frame_rate")));
        assert!(issues.iter().any(|issue| issue.contains("built-in")));
        assert!(issues.iter().any(|issue| issue.contains("2bad")));
        assert!(issues.iter().any(|issue| issue.contains("more than once")));
        assert!(issues.iter().any(|issue| issue.contains("empty path")));
    }

    #[test]
    fn round_trips_through_toml() {
        let manifest = SketchManifest::default();
        let raw = toml::to_string(&manifest).unwrap();
        let parsed: SketchManifest = toml::from_str(&raw).unwrap();
        assert_eq!(parsed, manifest);
    }
}

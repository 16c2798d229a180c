//! Wraps a sketch pack directory: loads `sketch.toml`, validates it, and
//! resolves the shader and texture paths it names against the pack root.
//!
//! Types:
//!
//! - `PackError` classifies missing directories, manifest parsing, validation,
//!   and I/O failures.
//! - `LocalSketch` stores the resolved root and parsed `SketchManifest`.
//!
//! Functions:
//!
//! - `LocalSketch::load` reads the manifest (falling back to defaults when the
//!   pack has none) and returns a filesystem-backed handle.
//! - `ensure_sources` confirms every shader and texture exists so later load
//!   errors point at shader code or image data, not missing files.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::manifest::{SketchManifest, TextureEntry};

pub const MANIFEST_FILE: &str = "sketch.toml";

#[derive(Debug, Error)]
pub enum PackError {
    #[error("sketch directory not found at {0}")]
    RootMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error("sketch files missing: {0:?}")]
    MissingSources(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LocalSketch {
    root: PathBuf,
    manifest: SketchManifest,
}

impl LocalSketch {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(PackError::RootMissing(root));
        }

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let raw = fs::read_to_string(&manifest_path)?;
            toml::from_str::<SketchManifest>(&raw)?
        } else {
            debug!(path = %manifest_path.display(), "no manifest; using stock sketch layout");
            SketchManifest::default()
        };

        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        Ok(Self { root, manifest })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &SketchManifest {
        &self.manifest
    }

    pub fn vertex_path(&self) -> PathBuf {
        self.root.join(&self.manifest.vertex)
    }

    pub fn fragment_path(&self) -> PathBuf {
        self.root.join(&self.manifest.fragment)
    }

    pub fn texture_path(&self, texture: &TextureEntry) -> PathBuf {
        self.root.join(&texture.path)
    }

    /// Uniform name and absolute path for every declared texture, in manifest
    /// order.
    pub fn textures(&self) -> impl Iterator<Item = (&str, PathBuf)> + '_ {
        self.manifest
            .textures
            .iter()
            .map(|texture| (texture.uniform.as_str(), self.texture_path(texture)))
    }
}

pub fn ensure_sources(pack: &LocalSketch) -> Result<Vec<PathBuf>, PackError> {
    let mut candidates = vec![pack.vertex_path(), pack.fragment_path()];
    candidates.extend(pack.textures().map(|(_, path)| path));

    let (resolved, missing): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|path| path.is_file());
    if !missing.is_empty() {
        return Err(PackError::MissingSources(
            missing
                .into_iter()
                .map(|path| format!("missing sketch file: {}", path.display()))
                .collect(),
        ));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_files(dir: &Path, files: &[(&str, &str)]) {
        for (path, contents) in files {
            let full_path = dir.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).expect("create dirs");
            }
            fs::write(full_path, contents).expect("write file");
        }
    }

    const STOCK_FILES: [(&str, &str); 5] = [
        ("shader.vert", "// vertex"),
        ("shader.frag", "// fragment"),
        ("images/bayer8.png", "fake"),
        ("images/bayer16.png", "fake"),
        ("images/blue_noise64.png", "fake"),
    ];

    #[test]
    fn missing_manifest_uses_stock_layout() {
        let temp = tempfile::tempdir().unwrap();
        write_files(temp.path(), &STOCK_FILES);

        let pack = LocalSketch::load(temp.path()).expect("load pack");
        assert_eq!(pack.manifest(), &SketchManifest::default());
        assert_eq!(pack.vertex_path(), temp.path().join("shader.vert"));
        let textures: Vec<_> = pack.textures().collect();
        assert_eq!(textures[2].0, "blueNoise64x64");
        assert_eq!(textures[2].1, temp.path().join("images/blue_noise64.png"));
        assert_eq!(ensure_sources(&pack).expect("sources exist").len(), 5);
    }

    #[test]
    fn reads_manifest_overrides() {
        let temp = tempfile::tempdir().unwrap();
        write_files(
            temp.path(),
            &[
                (MANIFEST_FILE, "fragment = \"alt.frag\"\ntextures = []\n"),
                ("shader.vert", "// vertex"),
                ("alt.frag", "// fragment"),
            ],
        );

        let pack = LocalSketch::load(temp.path()).expect("load pack");
        assert_eq!(pack.fragment_path(), temp.path().join("alt.frag"));
        assert_eq!(pack.textures().count(), 0);
        ensure_sources(&pack).expect("sources exist");
    }

    #[test]
    fn detects_missing_texture() {
        let temp = tempfile::tempdir().unwrap();
        write_files(temp.path(), &STOCK_FILES[..4]);

        let pack = LocalSketch::load(temp.path()).expect("load pack");
        match ensure_sources(&pack).unwrap_err() {
            PackError::MissingSources(missing) => {
                assert_eq!(missing.len(), 1);
                assert!(missing[0].contains("blue_noise64.png"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_invalid_manifest() {
        let temp = tempfile::tempdir().unwrap();
        write_files(temp.path(), &[(MANIFEST_FILE, "frame_rate = -1\n")]);
        assert!(matches!(
            LocalSketch::load(temp.path()),
            Err(PackError::ManifestValidation(_))
        ));
    }

    #[test]
    fn rejects_missing_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("absent");
        assert!(matches!(
            LocalSketch::load(&root),
            Err(PackError::RootMissing(path)) if path == root
        ));
    }
}

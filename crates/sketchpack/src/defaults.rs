use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::manifest::SketchManifest;
use crate::pack::{LocalSketch, MANIFEST_FILE};

/// Bundled p5-dialect vertex shader: passes texture coordinates through and
/// stretches the unit rectangle over clip space.
pub const DEFAULT_VERTEX_SHADER: &str = include_str!("../assets/shader.vert");

/// Bundled fragment shader: thresholds an animated scene against the three
/// dither textures, one vertical band each.
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("../assets/shader.frag");

#[derive(Debug, Default)]
pub struct DefaultPackReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Manifest a pack should be initialised against: the `sketch.toml` already
/// in `root`, or the stock manifest when there is none or `force` is set.
pub fn pack_manifest(root: &Path, force: bool) -> Result<SketchManifest> {
    if force || !root.join(MANIFEST_FILE).is_file() {
        return Ok(SketchManifest::default());
    }
    let pack = LocalSketch::load(root)
        .with_context(|| format!("existing manifest in {} is invalid", root.display()))?;
    Ok(pack.manifest().clone())
}

/// Installs `manifest` and the bundled shaders into `root`, placing the
/// shaders at the paths the manifest names.
///
/// Existing files are left alone unless `force` is set. Textures are not part
/// of this step; they are generated separately.
pub fn write_default_pack(
    root: &Path,
    manifest: &SketchManifest,
    force: bool,
) -> Result<DefaultPackReport> {
    fs::create_dir_all(root)
        .with_context(|| format!("failed to create sketch directory {}", root.display()))?;

    let manifest_raw =
        toml::to_string_pretty(manifest).context("failed to serialise sketch manifest")?;

    let files = [
        (root.join(MANIFEST_FILE), manifest_raw.as_str()),
        (root.join(&manifest.vertex), DEFAULT_VERTEX_SHADER),
        (root.join(&manifest.fragment), DEFAULT_FRAGMENT_SHADER),
    ];

    let mut report = DefaultPackReport::default();
    for (path, contents) in files {
        if path.exists() && !force {
            debug!(path = %path.display(), "keeping existing sketch file");
            report.skipped.push(path);
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        report.written.push(path);
    }

    info!(
        root = %root.display(),
        written = report.written.len(),
        skipped = report.skipped.len(),
        "installed default sketch files"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_pack() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = pack_manifest(temp.path(), false).unwrap();
        let report = write_default_pack(temp.path(), &manifest, false).unwrap();
        assert_eq!(report.written.len(), 3);
        assert!(report.skipped.is_empty());

        let pack = LocalSketch::load(temp.path()).unwrap();
        assert_eq!(pack.manifest(), &SketchManifest::default());
        let fragment = fs::read_to_string(pack.fragment_path()).unwrap();
        assert!(fragment.contains("uniform sampler2D blueNoise64x64;"));
    }

    #[test]
    fn keeps_existing_files_unless_forced() {
        let temp = tempfile::tempdir().unwrap();
        let fragment = temp.path().join("shader.frag");
        fs::write(&fragment, "// mine").unwrap();

        let manifest = SketchManifest::default();
        let report = write_default_pack(temp.path(), &manifest, false).unwrap();
        assert_eq!(report.skipped, vec![fragment.clone()]);
        assert_eq!(fs::read_to_string(&fragment).unwrap(), "// mine");

        let report = write_default_pack(temp.path(), &manifest, true).unwrap();
        assert_eq!(report.written.len(), 3);
        assert_eq!(
            fs::read_to_string(&fragment).unwrap(),
            DEFAULT_FRAGMENT_SHADER
        );
    }

    #[test]
    fn existing_manifest_decides_shader_paths() {
        let temp = tempfile::tempdir().unwrap();
        let raw = "vertex = \"glsl/main.vert\"\nfragment = \"glsl/main.frag\"\n\n\
                   [[textures]]\nuniform = \"bayer8x8\"\npath = \"pat/b.png\"\n";
        fs::write(temp.path().join(MANIFEST_FILE), raw).unwrap();

        let manifest = pack_manifest(temp.path(), false).unwrap();
        assert_eq!(manifest.fragment, PathBuf::from("glsl/main.frag"));
        assert_eq!(manifest.textures.len(), 1);

        let report = write_default_pack(temp.path(), &manifest, false).unwrap();
        assert_eq!(report.skipped, vec![temp.path().join(MANIFEST_FILE)]);
        assert!(temp.path().join("glsl/main.vert").is_file());
        assert!(temp.path().join("glsl/main.frag").is_file());
        assert!(!temp.path().join("shader.frag").exists());
        assert_eq!(fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap(), raw);

        assert_eq!(
            pack_manifest(temp.path(), true).unwrap(),
            SketchManifest::default()
        );
    }

    #[test]
    fn invalid_existing_manifest_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "frame_rate = 0\n").unwrap();
        assert!(pack_manifest(temp.path(), false).is_err());
    }

    #[test]
    fn bundled_shaders_use_the_uniform_contract() {
        for name in ["u_resolution", "u_time", "bayer8x8", "bayer16x16", "blueNoise64x64"] {
            assert!(DEFAULT_FRAGMENT_SHADER.contains(name), "{name} missing");
        }
        assert!(DEFAULT_VERTEX_SHADER.contains("attribute vec3 aPosition;"));
    }
}

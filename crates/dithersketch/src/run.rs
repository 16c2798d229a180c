use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dither::{write_default_textures, DefaultTexture, DEFAULT_TEXTURES};
use renderer::Renderer;
use sketchpack::{ensure_sources, pack_manifest, write_default_pack, LocalSketch, SketchManifest};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::build_renderer_config;
use crate::cli::{Cli, Command, InitArgs, RunArgs, TexturesArgs};

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    match cli.command {
        None => run_sketch(&cli.run),
        Some(Command::Run(args)) => run_sketch(&args),
        Some(Command::Textures(args)) => generate_textures(&args),
        Some(Command::Init(args)) => init_pack(&args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_sketch(args: &RunArgs) -> Result<()> {
    let pack = LocalSketch::load(&args.pack)
        .with_context(|| format!("failed to load sketch pack {}", args.pack.display()))?;
    let sources = ensure_sources(&pack).with_context(|| {
        format!(
            "sketch pack {} is incomplete; run `dithersketch init {}` to create it",
            pack.root().display(),
            pack.root().display()
        )
    })?;
    tracing::info!(
        root = %pack.root().display(),
        files = sources.len(),
        "loaded sketch pack"
    );

    let config = build_renderer_config(args, &pack)?;
    tracing::debug!(
        size = ?config.surface_size,
        fps = config.sketch.frame_rate,
        color_space = ?config.color_space,
        antialias = ?config.antialiasing,
        snapshot_dir = %config.snapshot_dir.display(),
        "resolved renderer config"
    );
    Renderer::new(config).run()
}

fn generate_textures(args: &TexturesArgs) -> Result<()> {
    if args.dry_run {
        for texture in DEFAULT_TEXTURES {
            println!(
                "{} ({}x{}, {:?}) -> {}",
                texture.uniform,
                texture.size,
                texture.size,
                texture.kind,
                args.dir.join(texture.file_name).display()
            );
        }
        return Ok(());
    }

    let written = write_default_textures(&args.dir, args.seed)
        .with_context(|| format!("failed to write textures into {}", args.dir.display()))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Textures `init` will generate and the ones it leaves in place.
#[derive(Debug, Default)]
struct TexturePlan {
    generate: Vec<(DefaultTexture, PathBuf)>,
    kept: Vec<PathBuf>,
}

/// Resolves every texture the manifest names against the built-in patterns.
///
/// Fails without touching the disk when a missing texture has no built-in
/// generator.
fn plan_textures(root: &Path, manifest: &SketchManifest, force: bool) -> Result<TexturePlan> {
    let mut plan = TexturePlan::default();
    let mut unknown = Vec::new();
    for entry in &manifest.textures {
        let path = root.join(&entry.path);
        if path.exists() && !force {
            plan.kept.push(path);
            continue;
        }
        match DefaultTexture::for_uniform(&entry.uniform) {
            Some(texture) => plan.generate.push((texture, path)),
            None => unknown.push(format!("{} ({})", entry.uniform, entry.path.display())),
        }
    }

    if !unknown.is_empty() {
        let known: Vec<&str> = DEFAULT_TEXTURES.iter().map(|texture| texture.uniform).collect();
        bail!(
            "cannot generate {}: built-in textures are {}; add the images by hand or rerun with --force to restore the stock manifest",
            unknown.join(", "),
            known.join(", ")
        );
    }
    Ok(plan)
}

fn init_pack(args: &InitArgs) -> Result<()> {
    let manifest = pack_manifest(&args.dir, args.force)?;
    let plan = plan_textures(&args.dir, &manifest, args.force)?;

    let report = write_default_pack(&args.dir, &manifest, args.force)?;
    for path in report.skipped.iter().chain(&plan.kept) {
        tracing::warn!(path = %path.display(), "kept existing file (use --force to overwrite)");
    }

    for (texture, path) in &plan.generate {
        texture
            .write_png(path, args.seed)
            .with_context(|| format!("failed to write texture {}", path.display()))?;
    }

    let pack = LocalSketch::load(&args.dir)
        .with_context(|| format!("failed to reload sketch pack {}", args.dir.display()))?;
    ensure_sources(&pack).context("initialised sketch pack is incomplete")?;

    println!(
        "initialised sketch pack at {} ({} files written, {} textures generated, {} kept)",
        args.dir.display(),
        report.written.len(),
        plan.generate.len(),
        report.skipped.len() + plan.kept.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchpack::TextureEntry;
    use std::fs;

    #[test]
    fn plan_keeps_existing_textures_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("bayer8.png"), "mine").unwrap();

        let manifest = SketchManifest::default();
        let plan = plan_textures(dir.path(), &manifest, false).unwrap();
        assert_eq!(plan.kept, vec![images.join("bayer8.png")]);
        let uniforms: Vec<&str> = plan.generate.iter().map(|(t, _)| t.uniform).collect();
        assert_eq!(uniforms, vec!["bayer16x16", "blueNoise64x64"]);

        let forced = plan_textures(dir.path(), &manifest, true).unwrap();
        assert!(forced.kept.is_empty());
        assert_eq!(forced.generate.len(), 3);
    }

    #[test]
    fn plan_follows_manifest_paths() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SketchManifest {
            textures: vec![TextureEntry::new("bayer16x16", "pat/sixteen.png")],
            ..SketchManifest::default()
        };
        let plan = plan_textures(dir.path(), &manifest, false).unwrap();
        assert_eq!(plan.generate.len(), 1);
        assert_eq!(plan.generate[0].0.size, 16);
        assert_eq!(plan.generate[0].1, dir.path().join("pat/sixteen.png"));
    }

    #[test]
    fn plan_rejects_missing_custom_textures() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SketchManifest {
            textures: vec![TextureEntry::new("pattern", "pat/p.png")],
            ..SketchManifest::default()
        };
        let err = plan_textures(dir.path(), &manifest, false).unwrap_err();
        assert!(err.to_string().contains("pattern (pat/p.png)"), "{err}");

        fs::create_dir_all(dir.path().join("pat")).unwrap();
        fs::write(dir.path().join("pat/p.png"), "mine").unwrap();
        let plan = plan_textures(dir.path(), &manifest, false).unwrap();
        assert!(plan.generate.is_empty());
        assert_eq!(plan.kept.len(), 1);
    }
}

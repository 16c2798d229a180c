use std::fs;
use std::process::Command;

use tempfile::TempDir;

#[test]
fn init_cli_writes_a_complete_pack() {
    let root = TempDir::new().unwrap();
    let pack = root.path().join("sketch");

    let status = Command::new(env!("CARGO_BIN_EXE_dithersketch"))
        .env("RUST_LOG", "warn")
        .arg("init")
        .arg(&pack)
        .status()
        .expect("failed to run dithersketch init");
    assert!(status.success());

    for file in [
        "sketch.toml",
        "shader.vert",
        "shader.frag",
        "images/bayer8.png",
        "images/bayer16.png",
        "images/blue_noise64.png",
    ] {
        assert!(pack.join(file).is_file(), "missing {file}");
    }
    let manifest = fs::read_to_string(pack.join("sketch.toml")).unwrap();
    assert!(manifest.contains("blueNoise64x64"));

    fs::write(pack.join("shader.frag"), "// edited\n").unwrap();
    fs::write(pack.join("images/bayer8.png"), "mine").unwrap();
    let second_status = Command::new(env!("CARGO_BIN_EXE_dithersketch"))
        .env("RUST_LOG", "warn")
        .arg("init")
        .arg(&pack)
        .status()
        .expect("failed to rerun dithersketch init");
    assert!(second_status.success());
    assert_eq!(
        fs::read_to_string(pack.join("shader.frag")).unwrap(),
        "// edited\n"
    );
    assert_eq!(fs::read(pack.join("images/bayer8.png")).unwrap(), b"mine");
}

#[test]
fn init_cli_follows_existing_manifest() {
    let root = TempDir::new().unwrap();
    let pack = root.path().join("custom");
    fs::create_dir_all(&pack).unwrap();
    fs::write(
        pack.join("sketch.toml"),
        "fragment = \"glsl/main.frag\"\n\n[[textures]]\nuniform = \"bayer16x16\"\npath = \"pat/b.png\"\n",
    )
    .unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_dithersketch"))
        .env("RUST_LOG", "warn")
        .arg("init")
        .arg(&pack)
        .status()
        .expect("failed to run dithersketch init");
    assert!(status.success());

    assert!(pack.join("shader.vert").is_file());
    assert!(pack.join("glsl/main.frag").is_file());
    assert!(pack.join("pat/b.png").is_file());
    assert!(!pack.join("shader.frag").exists());
    assert!(!pack.join("images").exists());
}

#[test]
fn init_cli_refuses_unknown_textures_before_writing() {
    let root = TempDir::new().unwrap();
    let pack = root.path().join("custom");
    fs::create_dir_all(&pack).unwrap();
    fs::write(
        pack.join("sketch.toml"),
        "[[textures]]\nuniform = \"pattern\"\npath = \"pat/p.png\"\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_dithersketch"))
        .env("RUST_LOG", "warn")
        .arg("init")
        .arg(&pack)
        .output()
        .expect("failed to run dithersketch init");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pattern (pat/p.png)"), "{stderr}");
    let mut entries: Vec<_> = fs::read_dir(&pack)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["sketch.toml"]);
}

#[test]
fn textures_dry_run_writes_nothing() {
    let root = TempDir::new().unwrap();
    let images = root.path().join("images");

    let output = Command::new(env!("CARGO_BIN_EXE_dithersketch"))
        .env("RUST_LOG", "warn")
        .args(["textures", "--dry-run"])
        .arg(&images)
        .output()
        .expect("failed to run dithersketch textures");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for uniform in ["bayer8x8", "bayer16x16", "blueNoise64x64"] {
        assert!(stdout.contains(uniform), "{stdout}");
    }
    assert!(!images.exists());
}

#[test]
fn run_reports_missing_pack_files() {
    let root = TempDir::new().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_dithersketch"))
        .env("RUST_LOG", "warn")
        .env_remove("DITHERSKETCH_PACK")
        .arg(root.path())
        .output()
        .expect("failed to run dithersketch");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("incomplete"), "{stderr}");
}

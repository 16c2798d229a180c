use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

const SNAPSHOT_STEM: &str = "untitled";
const SNAPSHOT_EXTENSION: &str = "png";

/// Default snapshot name for `timestamp`, e.g.
/// `untitled-20240131-235959-042.png`.
pub fn snapshot_file_name(timestamp: DateTime<Local>) -> String {
    format!(
        "{SNAPSHOT_STEM}-{}.{SNAPSHOT_EXTENSION}",
        timestamp.format("%Y%m%d-%H%M%S-%3f")
    )
}

/// First path in `dir` for `timestamp` that does not exist yet.
///
/// Snapshots taken within the same millisecond get `-1`, `-2`, ... suffixes.
pub fn next_snapshot_path(dir: &Path, timestamp: DateTime<Local>) -> PathBuf {
    let name = snapshot_file_name(timestamp);
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name.trim_end_matches(&format!(".{SNAPSHOT_EXTENSION}"));
    (1u32..)
        .map(|suffix| dir.join(format!("{stem}-{suffix}.{SNAPSHOT_EXTENSION}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_timestamp() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 31, 23, 59, 58)
            .single()
            .unwrap()
            + chrono::Duration::milliseconds(42)
    }

    #[test]
    fn names_follow_timestamp_pattern() {
        assert_eq!(
            snapshot_file_name(fixed_timestamp()),
            "untitled-20240131-235958-042.png"
        );
    }

    #[test]
    fn avoids_clobbering_existing_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let timestamp = fixed_timestamp();

        let first = next_snapshot_path(dir.path(), timestamp);
        assert_eq!(first, dir.path().join("untitled-20240131-235958-042.png"));
        std::fs::write(&first, b"png").unwrap();

        let second = next_snapshot_path(dir.path(), timestamp);
        assert_eq!(second, dir.path().join("untitled-20240131-235958-042-1.png"));
        std::fs::write(&second, b"png").unwrap();

        let third = next_snapshot_path(dir.path(), timestamp);
        assert_eq!(third, dir.path().join("untitled-20240131-235958-042-2.png"));
    }
}

//! Filesystem helpers shared by the export engines and the CLI.

use std::path::Path;

use anyhow::{Context, Result};

/// Maximum allowed size of an export document read into memory.
pub const MAX_DOCUMENT_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB
/// Maximum allowed size of a scene description read into memory.
pub const MAX_SCENE_BYTES: u64 = 64 * 1024 * 1024; // 64 MiB

/// Read a file into memory with a size cap.
pub fn read_file_with_limit(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;
    let len = metadata.len();
    if len > max_bytes {
        anyhow::bail!(
            "File too large: {} ({} bytes, max {} bytes)",
            path.display(),
            len,
            max_bytes
        );
    }
    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Serialize `value` as JSON indented with four spaces.
pub fn to_json_pretty<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut ser)
        .context("Failed to serialize JSON")?;
    Ok(out)
}

/// Write `value` as four-space indented JSON, creating parent directories.
pub fn write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = to_json_pretty(value)?;
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

/// `std::fs::create_dir_all` with the path in the error.
pub fn create_dir_all(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

/// Copy `src` to `dst` unless `dst` already exists.
///
/// Returns `true` when a copy happened. An existing destination is never
/// overwritten, even if `src` changed since it was written.
pub fn copy_if_absent(src: &Path, dst: &Path) -> Result<bool> {
    if dst.exists() {
        return Ok(false);
    }
    if let Some(parent) = dst.parent() {
        create_dir_all(parent)?;
    }
    std::fs::copy(src, dst).with_context(|| {
        format!("Failed to copy {} -> {}", src.display(), dst.display())
    })?;
    Ok(true)
}

/// Remove a regular file if present. Returns `true` when something was removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    std::fs::remove_file(path)
        .with_context(|| format!("Failed to remove file: {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copy_if_absent_keeps_first_writer() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let dst = dir.path().join("out/texture/a.png");
        std::fs::write(&a, b"first").unwrap();
        std::fs::write(&b, b"second").unwrap();

        assert!(copy_if_absent(&a, &dst).unwrap());
        assert!(!copy_if_absent(&b, &dst).unwrap());
        assert_eq!(std::fs::read(&dst).unwrap(), b"first");
    }

    #[test]
    fn remove_file_if_exists_ignores_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.png");
        assert!(!remove_file_if_exists(&path).unwrap());
        std::fs::write(&path, b"x").unwrap();
        assert!(remove_file_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn read_file_with_limit_rejects_large_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.json");
        std::fs::write(&path, vec![b' '; 64]).unwrap();
        assert!(read_file_with_limit(&path, 16).is_err());
        assert_eq!(read_file_with_limit(&path, 64).unwrap().len(), 64);
    }

    #[test]
    fn json_uses_four_space_indent() {
        let value = serde_json::json!({ "a": [1] });
        let text = String::from_utf8(to_json_pretty(&value).unwrap()).unwrap();
        assert_eq!(text, "{\n    \"a\": [\n        1\n    ]\n}");
    }
}

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::current_unix_timestamp_ms;

/// Writes `content` through a sibling temp file and a rename, so a reader of
/// `path` sees either the previous report or the complete new one.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("report");
    let temp_path = parent_dir.join(format!(
        ".{file_name}.tmp-{}-{}",
        std::process::id(),
        current_unix_timestamp_ms()
    ));
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    if let Err(error) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_text_atomic;

    #[test]
    fn functional_write_text_atomic_replaces_existing_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested").join("report.json");
        write_text_atomic(&path, "{\"v\":1}").expect("first write");
        write_text_atomic(&path, "{\"v\":2}").expect("second write");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "{\"v\":2}"
        );

        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
            .count();
        assert_eq!(leftovers, 0, "temp files should not linger");
    }

    #[test]
    fn regression_write_text_atomic_rejects_directory_and_empty_paths() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "x").expect_err("directory target");
        assert!(error.to_string().contains("is a directory"));

        let error = write_text_atomic(std::path::Path::new(""), "x").expect_err("empty path");
        assert!(error.to_string().contains("cannot be empty"));
    }
}

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const DEFAULT_ROTATION_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_ROTATION_MAX_FILES: usize = 5;
const MAX_BYTES_ENV: &str = "PARLEY_TELEMETRY_ROTATION_MAX_BYTES";
const MAX_FILES_ENV: &str = "PARLEY_TELEMETRY_ROTATION_MAX_FILES";

/// Size-based rotation for append-only NDJSON files.
///
/// `max_files` counts the active file plus its numbered backups
/// (`<path>.1` is the most recent backup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_ROTATION_MAX_BYTES,
            max_files: DEFAULT_ROTATION_MAX_FILES,
        }
    }
}

impl LogRotationPolicy {
    /// A policy that never rotates.
    pub fn disabled() -> Self {
        Self {
            max_bytes: 0,
            max_files: 0,
        }
    }

    /// Reads `PARLEY_TELEMETRY_ROTATION_MAX_BYTES` / `_MAX_FILES`, falling back
    /// to the defaults for missing, unparsable or zero values.
    pub fn from_env() -> Self {
        Self::from_raw_values(
            std::env::var(MAX_BYTES_ENV).ok().as_deref(),
            std::env::var(MAX_FILES_ENV).ok().as_deref(),
        )
    }

    fn from_raw_values(max_bytes: Option<&str>, max_files: Option<&str>) -> Self {
        let max_bytes = max_bytes
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_ROTATION_MAX_BYTES);
        let max_files = max_files
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_ROTATION_MAX_FILES);
        Self {
            max_bytes,
            max_files,
        }
    }

    pub fn is_enabled(self) -> bool {
        self.max_bytes > 0 && self.max_files > 0
    }
}

/// Appends one NDJSON line to `path`, rotating first when the line would push
/// the active file past `policy.max_bytes`.
pub fn append_line_with_rotation(path: &Path, line: &str, policy: LogRotationPolicy) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    if policy.is_enabled() && path.exists() {
        let current_size = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let incoming_size = u64::try_from(line.len().saturating_add(1)).unwrap_or(u64::MAX);
        if current_size > 0 && current_size.saturating_add(incoming_size) > policy.max_bytes {
            rotate(path, policy)?;
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), index))
}

fn rotate(path: &Path, policy: LogRotationPolicy) -> Result<()> {
    if policy.max_files <= 1 {
        return std::fs::remove_file(path)
            .with_context(|| format!("failed to truncate {}", path.display()));
    }

    // Shift <path>.N-1 -> <path>.N from the oldest end; the oldest backup falls off.
    let oldest = policy.max_files - 1;
    for index in (1..=oldest).rev() {
        let source = if index == 1 {
            path.to_path_buf()
        } else {
            backup_path(path, index - 1)
        };
        if !source.exists() {
            continue;
        }
        let destination = backup_path(path, index);
        if destination.exists() {
            std::fs::remove_file(&destination)
                .with_context(|| format!("failed to drop backup {}", destination.display()))?;
        }
        std::fs::rename(&source, &destination).with_context(|| {
            format!(
                "failed to rotate {} to {}",
                source.display(),
                destination.display()
            )
        })?;
    }
    Ok(())
}

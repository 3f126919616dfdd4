use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use parley_core::{append_line_with_rotation, LogRotationPolicy};
use serde::Serialize;
use serde_json::Value;

use crate::client::{TelemetryEvent, TelemetrySink};

pub const TELEMETRY_EVENT_RECORD_TYPE: &str = "telemetry_event_v1";
pub const TELEMETRY_EVENT_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct TelemetryEventRecord<'a> {
    record_type: &'static str,
    schema_version: u32,
    #[serde(flatten)]
    event: &'a TelemetryEvent,
}

/// Appends one JSON object per event to a local file, rotating by size.
#[derive(Debug)]
pub struct JsonlTelemetrySink {
    path: PathBuf,
    policy: LogRotationPolicy,
    write_lock: Mutex<()>,
}

impl JsonlTelemetrySink {
    pub fn open(path: impl Into<PathBuf>, policy: LogRotationPolicy) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            bail!("telemetry log path cannot be empty");
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "failed to create telemetry log directory {}",
                        parent.display()
                    )
                })?;
            }
        }
        Ok(Self {
            path,
            policy,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads back every `telemetry_event_v1` record in `path`.
    ///
    /// Blank lines are skipped; lines of any other record type are an error.
    pub fn load_events(path: &Path) -> Result<Vec<TelemetryEvent>> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read telemetry log {}", path.display()))?;
        let mut events = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).with_context(|| {
                format!("invalid telemetry record at {}:{}", path.display(), index + 1)
            })?;
            let record_type = value
                .get("record_type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if record_type != TELEMETRY_EVENT_RECORD_TYPE {
                bail!(
                    "unsupported telemetry record type '{}' at {}:{}",
                    record_type,
                    path.display(),
                    index + 1
                );
            }
            events.push(serde_json::from_value(value).with_context(|| {
                format!("invalid telemetry event at {}:{}", path.display(), index + 1)
            })?);
        }
        Ok(events)
    }
}

impl TelemetrySink for JsonlTelemetrySink {
    fn track(&self, event: &TelemetryEvent) -> Result<()> {
        let line = serde_json::to_string(&TelemetryEventRecord {
            record_type: TELEMETRY_EVENT_RECORD_TYPE,
            schema_version: TELEMETRY_EVENT_SCHEMA_VERSION,
            event,
        })
        .context("failed to encode telemetry event")?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("telemetry log lock is poisoned"))?;
        append_line_with_rotation(&self.path, &line, self.policy)
            .with_context(|| format!("failed to write telemetry log {}", self.path.display()))
    }
}

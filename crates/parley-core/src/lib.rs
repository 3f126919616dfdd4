//! Low-level utilities shared across parley crates.
//!
//! Provides the wall-clock helper stamped onto telemetry records, atomic text
//! writes for replay reports, and size-based NDJSON rotation for file sinks.

pub mod atomic_io;
pub mod log_rotation;

pub use atomic_io::write_text_atomic;
pub use log_rotation::{append_line_with_rotation, LogRotationPolicy};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::current_unix_timestamp_ms;

    #[test]
    fn unit_current_unix_timestamp_ms_is_monotonic_enough_for_records() {
        let first = current_unix_timestamp_ms();
        let second = current_unix_timestamp_ms();
        assert!(first > 1_600_000_000_000, "clock should be past 2020");
        assert!(second >= first);
    }
}

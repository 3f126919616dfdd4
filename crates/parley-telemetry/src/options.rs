use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryConfigError {
    #[error("telemetry instrumentation key must not be empty")]
    MissingInstrumentationKey,
}

/// Settings for the telemetry interceptor.
///
/// Sender display names and message text are personal data; both are left
/// out of emitted events unless explicitly enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryOptions {
    pub instrumentation_key: String,
    pub include_sender_name: bool,
    pub include_original_text: bool,
}

impl TelemetryOptions {
    pub fn new(instrumentation_key: impl Into<String>) -> Self {
        Self {
            instrumentation_key: instrumentation_key.into(),
            ..Self::default()
        }
    }

    pub fn with_sender_name(mut self, include: bool) -> Self {
        self.include_sender_name = include;
        self
    }

    pub fn with_original_text(mut self, include: bool) -> Self {
        self.include_original_text = include;
        self
    }

    /// Rejects options that cannot produce attributable events.
    pub fn validate(&self) -> Result<(), TelemetryConfigError> {
        if self.instrumentation_key.trim().is_empty() {
            return Err(TelemetryConfigError::MissingInstrumentationKey);
        }
        Ok(())
    }
}

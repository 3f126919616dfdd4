use anyhow::Result;

use crate::client::{TelemetryEvent, TelemetrySink};

/// Writes each event as an `info` record under the `parley::telemetry` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn track(&self, event: &TelemetryEvent) -> Result<()> {
        tracing::info!(
            target: "parley::telemetry",
            event = event.name.as_str(),
            session_id = event.session_id.as_deref().unwrap_or_default(),
            user_id = event.user_id.as_deref().unwrap_or_default(),
            properties = ?event.properties,
            "telemetry event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TracingTelemetrySink;
    use crate::client::{TelemetryEvent, TelemetryProperties, TelemetrySink};

    #[test]
    fn unit_tracing_sink_accepts_events_without_subscriber() {
        let event = TelemetryEvent {
            name: "BotMessageSend".to_string(),
            properties: TelemetryProperties::new(),
            instrumentation_key: "k".to_string(),
            session_id: None,
            user_id: None,
            timestamp_unix_ms: 1,
        };
        assert!(TracingTelemetrySink.track(&event).is_ok());
    }
}

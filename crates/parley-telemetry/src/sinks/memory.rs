use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::client::{TelemetryEvent, TelemetrySink};

/// Keeps every tracked event in memory, in tracking order.
#[derive(Debug, Default)]
pub struct MemoryTelemetrySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events with the given name, in tracking order.
    pub fn named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.name == name)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl TelemetrySink for MemoryTelemetrySink {
    fn track(&self, event: &TelemetryEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("memory telemetry sink lock is poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

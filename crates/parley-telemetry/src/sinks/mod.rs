mod buffered;
mod jsonl;
mod memory;
mod tracing_sink;

pub use buffered::{BufferedTelemetrySink, TelemetryDispatchMetrics};
pub use jsonl::{JsonlTelemetrySink, TELEMETRY_EVENT_RECORD_TYPE, TELEMETRY_EVENT_SCHEMA_VERSION};
pub use memory::MemoryTelemetrySink;
pub use tracing_sink::TracingTelemetrySink;

//! Best-effort message lifecycle telemetry for turns.
//!
//! [`TelemetryInterceptor::attach`] stores a [`TelemetryClient`] on the turn,
//! emits a `BotMessageReceived` event for the inbound activity and registers
//! hooks that emit `BotMessageSend`, `BotMessageUpdate` and `BotMessageDelete`
//! after the corresponding transport call succeeds. Telemetry failures are
//! dropped at the interceptor boundary.

mod client;
mod interceptor;
mod options;
pub mod properties;
mod sinks;

pub use client::{
    TelemetryClient, TelemetryContext, TelemetryEvent, TelemetryProperties, TelemetrySink,
};
pub use interceptor::{
    attach_telemetry, deleted_record, TelemetryInterceptor, BOT_MESSAGE_DELETE_EVENT,
    BOT_MESSAGE_RECEIVED_EVENT, BOT_MESSAGE_SEND_EVENT, BOT_MESSAGE_UPDATE_EVENT,
    TELEMETRY_CLIENT_SERVICE_KEY,
};
pub use options::{TelemetryConfigError, TelemetryOptions};
pub use sinks::{
    BufferedTelemetrySink, JsonlTelemetrySink, MemoryTelemetrySink, TelemetryDispatchMetrics,
    TracingTelemetrySink, TELEMETRY_EVENT_RECORD_TYPE, TELEMETRY_EVENT_SCHEMA_VERSION,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use parley_core::current_unix_timestamp_ms;
use parley_schema::Activity;
use serde::{Deserialize, Serialize};

/// Flat string-to-string property map attached to every event.
pub type TelemetryProperties = BTreeMap<String, String>;

/// One named event as handed to a [`TelemetrySink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub properties: TelemetryProperties,
    pub instrumentation_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp_unix_ms: u64,
}

/// Destination for telemetry events.
///
/// `track` runs inline with the turn operation that produced the event, so
/// implementations should not block for long; wrap slow sinks in
/// [`crate::BufferedTelemetrySink`].
pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: &TelemetryEvent) -> Result<()>;
}

/// Correlation identifiers stamped on every event of one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryContext {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

impl TelemetryContext {
    /// Session is the conversation id, user is the sender id. Blank ids are
    /// treated as absent.
    pub fn from_activity(activity: &Activity) -> Self {
        Self {
            session_id: activity
                .conversation
                .as_ref()
                .and_then(|conversation| non_blank(&conversation.id)),
            user_id: activity.from.as_ref().and_then(|from| non_blank(&from.id)),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// Turn-scoped emitter bound to one sink and instrumentation key.
pub struct TelemetryClient {
    sink: Arc<dyn TelemetrySink>,
    instrumentation_key: String,
    context: TelemetryContext,
}

impl TelemetryClient {
    pub fn new(
        sink: Arc<dyn TelemetrySink>,
        instrumentation_key: impl Into<String>,
        context: TelemetryContext,
    ) -> Self {
        Self {
            sink,
            instrumentation_key: instrumentation_key.into(),
            context,
        }
    }

    pub fn instrumentation_key(&self) -> &str {
        &self.instrumentation_key
    }

    pub fn context(&self) -> &TelemetryContext {
        &self.context
    }

    pub fn track_event(&self, name: &str, properties: TelemetryProperties) -> Result<()> {
        let event = TelemetryEvent {
            name: name.to_string(),
            properties,
            instrumentation_key: self.instrumentation_key.clone(),
            session_id: self.context.session_id.clone(),
            user_id: self.context.user_id.clone(),
            timestamp_unix_ms: current_unix_timestamp_ms(),
        };
        self.sink.track(&event)
    }
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("instrumentation_key", &self.instrumentation_key)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parley_schema::{Activity, ChannelAccount, ConversationAccount};

    use super::{TelemetryClient, TelemetryContext, TelemetryProperties};
    use crate::MemoryTelemetrySink;

    #[test]
    fn unit_context_correlates_conversation_and_sender() {
        let activity = Activity {
            from: Some(ChannelAccount::new("u1")),
            conversation: Some(ConversationAccount::new("c1")),
            ..Activity::message("hi")
        };
        let context = TelemetryContext::from_activity(&activity);
        assert_eq!(context.session_id.as_deref(), Some("c1"));
        assert_eq!(context.user_id.as_deref(), Some("u1"));
        assert_eq!(
            TelemetryContext::from_activity(&Activity::message("x")),
            TelemetryContext::default()
        );
        let anonymous = Activity {
            from: Some(ChannelAccount::new(" ")),
            ..Activity::message("x")
        };
        assert_eq!(TelemetryContext::from_activity(&anonymous).user_id, None);
    }

    #[test]
    fn functional_track_event_stamps_key_and_context() {
        let sink = Arc::new(MemoryTelemetrySink::new());
        let client = TelemetryClient::new(
            sink.clone(),
            "ikey",
            TelemetryContext {
                session_id: Some("c1".to_string()),
                user_id: None,
            },
        );
        let mut properties = TelemetryProperties::new();
        properties.insert("Channel".to_string(), "test".to_string());
        client.track_event("Custom", properties.clone()).expect("track");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Custom");
        assert_eq!(events[0].instrumentation_key, "ikey");
        assert_eq!(events[0].session_id.as_deref(), Some("c1"));
        assert_eq!(events[0].user_id, None);
        assert_eq!(events[0].properties, properties);
        assert!(events[0].timestamp_unix_ms > 0);
    }
}

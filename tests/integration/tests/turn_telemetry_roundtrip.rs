use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parley_core::LogRotationPolicy;
use parley_schema::{
    Activity, ChannelAccount, ConversationAccount, ConversationReference, ResourceResponse,
};
use parley_telemetry::{
    attach_telemetry, BufferedTelemetrySink, JsonlTelemetrySink, MemoryTelemetrySink,
    TelemetryClient, TelemetryOptions, TelemetryProperties, BOT_MESSAGE_DELETE_EVENT,
    BOT_MESSAGE_RECEIVED_EVENT, BOT_MESSAGE_SEND_EVENT, BOT_MESSAGE_UPDATE_EVENT,
    TELEMETRY_CLIENT_SERVICE_KEY,
};
use parley_turn::{
    ActivityTransport, OperationHook, SendActivitiesNext, TurnCancellationToken, TurnContext,
    TurnError, UpdateActivityNext,
};
use serde_json::Value;

/// Transport that records the order in which calls reach the wire.
#[derive(Default)]
struct ScriptedTransport {
    calls: Mutex<Vec<String>>,
    send_delay: Option<Duration>,
    reject_deletes: bool,
}

impl ScriptedTransport {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl ActivityTransport for ScriptedTransport {
    async fn send_activities(&self, activities: Vec<Activity>) -> Result<Vec<ResourceResponse>> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = Vec::new();
        for activity in activities {
            let id = format!("wire-{}", activity.text.as_deref().unwrap_or("?"));
            self.push(format!("send:{id}"));
            responses.push(ResourceResponse::new(id));
        }
        Ok(responses)
    }

    async fn update_activity(&self, activity: Activity) -> Result<ResourceResponse> {
        let id = activity.id.unwrap_or_default();
        self.push(format!("update:{id}"));
        Ok(ResourceResponse::new(id))
    }

    async fn delete_activity(&self, reference: ConversationReference) -> Result<()> {
        if self.reject_deletes {
            bail!("channel does not support deletes");
        }
        self.push(format!(
            "delete:{}",
            reference.activity_id.unwrap_or_default()
        ));
        Ok(())
    }
}

/// Emits a custom event through the turn's stored telemetry client before
/// every send, then lets the send proceed.
struct AuditSends;

#[async_trait]
impl OperationHook<Vec<Activity>, Vec<ResourceResponse>> for AuditSends {
    async fn handle(
        &self,
        turn: &TurnContext,
        activities: Vec<Activity>,
        next: SendActivitiesNext<'_>,
    ) -> Result<Vec<ResourceResponse>, TurnError> {
        if let Some(client) = turn.service::<TelemetryClient>(TELEMETRY_CLIENT_SERVICE_KEY) {
            let mut properties = TelemetryProperties::new();
            properties.insert("Count".to_string(), activities.len().to_string());
            let _ = client.track_event("AuditSend", properties);
        }
        next.run(activities).await
    }
}

/// Answers updates locally without touching the transport.
struct SuppressUpdates;

#[async_trait]
impl OperationHook<Activity, ResourceResponse> for SuppressUpdates {
    async fn handle(
        &self,
        _turn: &TurnContext,
        activity: Activity,
        _next: UpdateActivityNext<'_>,
    ) -> Result<ResourceResponse, TurnError> {
        Ok(ResourceResponse::new(format!(
            "suppressed-{}",
            activity.id.unwrap_or_default()
        )))
    }
}

fn inbound() -> Activity {
    Activity {
        id: Some("in-1".to_string()),
        channel_id: Some("webchat".to_string()),
        locale: Some("en-US".to_string()),
        from: Some(ChannelAccount::named("u1", "Alice")),
        recipient: Some(ChannelAccount::named("bot", "Parley")),
        conversation: Some(ConversationAccount::named("c1", "Lobby")),
        ..Activity::message("hi")
    }
}

fn names(sink: &MemoryTelemetrySink) -> Vec<String> {
    sink.events().into_iter().map(|event| event.name).collect()
}

#[tokio::test]
async fn integration_hooks_and_telemetry_compose_in_registration_order() {
    let transport = Arc::new(ScriptedTransport::default());
    let sink = Arc::new(MemoryTelemetrySink::new());
    let mut turn = TurnContext::new(transport.clone(), Some(inbound()));
    attach_telemetry(
        &mut turn,
        TelemetryOptions::new("ikey").with_original_text(true),
        sink.clone(),
    )
    .expect("attach telemetry");
    turn.on_send(AuditSends);
    turn.on_update(SuppressUpdates);

    let responses = turn
        .send_activities(vec![Activity::message("a"), Activity::message("b")])
        .await
        .expect("send");
    assert_eq!(
        responses
            .iter()
            .map(|response| response.id.as_str())
            .collect::<Vec<_>>(),
        vec!["wire-a", "wire-b"]
    );

    let mut edit = Activity::message("a2");
    edit.id = Some("wire-a".to_string());
    let updated = turn.update_activity(edit).await.expect("update");
    assert_eq!(updated.id, "suppressed-wire-a");

    turn.delete_activity("wire-b").await.expect("delete");

    assert_eq!(
        transport.calls(),
        vec!["send:wire-a", "send:wire-b", "delete:wire-b"]
    );
    // The audit hook runs inside telemetry's send hook, so its event lands
    // before the send events telemetry emits on the way out.
    assert_eq!(
        names(&sink),
        vec![
            BOT_MESSAGE_RECEIVED_EVENT,
            "AuditSend",
            BOT_MESSAGE_SEND_EVENT,
            BOT_MESSAGE_SEND_EVENT,
            BOT_MESSAGE_UPDATE_EVENT,
            BOT_MESSAGE_DELETE_EVENT,
        ]
    );

    let events = sink.events();
    assert_eq!(events[1].properties["Count"], "2");
    assert_eq!(events[1].session_id.as_deref(), Some("c1"));
    assert_eq!(events[4].properties["Text"], "a2");
    let deleted = &events[5].properties;
    assert_eq!(deleted["ActivityId"], "wire-b");
    assert_eq!(deleted["RecipientId"], "u1");
    assert_eq!(deleted["ConversationName"], "Lobby");
    assert!(turn.responded());
}

#[tokio::test]
async fn integration_transport_error_surfaces_unchanged_with_telemetry_attached() {
    let transport = Arc::new(ScriptedTransport {
        reject_deletes: true,
        ..ScriptedTransport::default()
    });
    let sink = Arc::new(MemoryTelemetrySink::new());
    let mut turn = TurnContext::new(transport, Some(inbound()));
    attach_telemetry(&mut turn, TelemetryOptions::new("ikey"), sink.clone())
        .expect("attach telemetry");

    let error = turn
        .delete_activity("wire-a")
        .await
        .expect_err("delete rejected");
    assert!(matches!(error, TurnError::Transport(_)));
    assert_eq!(error.to_string(), "channel does not support deletes");
    assert_eq!(names(&sink), vec![BOT_MESSAGE_RECEIVED_EVENT]);
}

#[tokio::test]
async fn integration_cancellation_mid_send_emits_no_send_event() {
    let transport = Arc::new(ScriptedTransport {
        send_delay: Some(Duration::from_millis(500)),
        ..ScriptedTransport::default()
    });
    let token = TurnCancellationToken::new();
    let sink = Arc::new(MemoryTelemetrySink::new());
    let mut turn = TurnContext::new(transport.clone(), Some(inbound()))
        .with_cancellation_token(token.clone());
    attach_telemetry(&mut turn, TelemetryOptions::new("ikey"), sink.clone())
        .expect("attach telemetry");

    let (result, ()) = tokio::join!(turn.send_activity(Activity::message("slow")), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    assert!(result.expect_err("cancelled").is_cancelled());
    assert!(transport.calls().is_empty());
    assert!(!turn.responded());
    assert_eq!(names(&sink), vec![BOT_MESSAGE_RECEIVED_EVENT]);
}

#[tokio::test]
async fn integration_buffered_jsonl_sink_persists_turn_events() {
    let temp = tempfile::tempdir().expect("tempdir");
    let log_path = temp.path().join("telemetry/events.jsonl");
    let writer =
        JsonlTelemetrySink::open(&log_path, LogRotationPolicy::default()).expect("open log");
    let buffered = Arc::new(BufferedTelemetrySink::spawn(Arc::new(writer), 32));

    let mut turn = TurnContext::new(Arc::new(ScriptedTransport::default()), Some(inbound()));
    attach_telemetry(&mut turn, TelemetryOptions::new("ikey"), buffered.clone())
        .expect("attach telemetry");
    turn.send_activity(Activity::message("hello"))
        .await
        .expect("send");

    assert!(buffered.flush(Duration::from_secs(2)));
    let events = JsonlTelemetrySink::load_events(&log_path).expect("load events");
    assert_eq!(
        events
            .iter()
            .map(|event| event.name.as_str())
            .collect::<Vec<_>>(),
        vec![BOT_MESSAGE_RECEIVED_EVENT, BOT_MESSAGE_SEND_EVENT]
    );
    assert!(events
        .iter()
        .all(|event| event.instrumentation_key == "ikey"
            && event.user_id.as_deref() == Some("u1")));
    assert_eq!(buffered.metrics().completed, 2);

    let raw = std::fs::read_to_string(&log_path).expect("read log");
    let records = raw
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("json record"))
        .collect::<Vec<_>>();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record["record_type"], "telemetry_event_v1");
        assert_eq!(record["schema_version"], 1);
        assert_eq!(record["session_id"], "c1");
    }
    assert_eq!(records[1]["properties"]["RecipientId"], "u1");
    assert!(records[1]["properties"].get("Text").is_none());
}

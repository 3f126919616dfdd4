use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parley_schema::{Activity, ActivityKind, ConversationReference, ResourceResponse};
use parley_turn::{
    DeleteActivityNext, OperationHook, SendActivitiesNext, TurnContext, TurnError,
    UpdateActivityNext,
};

use crate::client::{TelemetryClient, TelemetryContext, TelemetryProperties, TelemetrySink};
use crate::options::{TelemetryConfigError, TelemetryOptions};
use crate::properties::{
    deleted_properties, received_properties, sent_properties, updated_properties,
};

pub const BOT_MESSAGE_RECEIVED_EVENT: &str = "BotMessageReceived";
pub const BOT_MESSAGE_SEND_EVENT: &str = "BotMessageSend";
pub const BOT_MESSAGE_UPDATE_EVENT: &str = "BotMessageUpdate";
pub const BOT_MESSAGE_DELETE_EVENT: &str = "BotMessageDelete";

/// Turn service key under which the attached [`TelemetryClient`] is stored.
pub const TELEMETRY_CLIENT_SERVICE_KEY: &str = "parley.telemetry.client";

/// Emits lifecycle events for every message a turn receives, sends, updates
/// or deletes.
///
/// Telemetry is best-effort: failures building or tracking an event drop the
/// event and never reach the caller of the turn operation.
#[derive(Clone)]
pub struct TelemetryInterceptor {
    options: TelemetryOptions,
    sink: Arc<dyn TelemetrySink>,
}

impl TelemetryInterceptor {
    pub fn new(
        options: TelemetryOptions,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self, TelemetryConfigError> {
        options.validate()?;
        Ok(Self { options, sink })
    }

    pub fn options(&self) -> &TelemetryOptions {
        &self.options
    }

    /// Wires telemetry into `turn` and returns the client it stored.
    ///
    /// The received event, if any, is emitted before the hooks are
    /// registered. Attaching twice registers the hooks twice.
    pub fn attach(&self, turn: &mut TurnContext) -> Arc<TelemetryClient> {
        let context = turn
            .activity()
            .map(TelemetryContext::from_activity)
            .unwrap_or_default();
        let client = Arc::new(TelemetryClient::new(
            Arc::clone(&self.sink),
            self.options.instrumentation_key.clone(),
            context,
        ));
        turn.attach(TELEMETRY_CLIENT_SERVICE_KEY, Arc::clone(&client));

        if let Some(activity) = turn.activity() {
            if let Some(properties) = capture(BOT_MESSAGE_RECEIVED_EVENT, || {
                Ok(received_properties(activity, &self.options))
            }) {
                emit(&client, BOT_MESSAGE_RECEIVED_EVENT, properties);
            }
        }

        let hook = TelemetryHook {
            client: Arc::clone(&client),
            options: self.options.clone(),
        };
        turn.on_send(hook.clone());
        turn.on_update(hook.clone());
        turn.on_delete(hook);
        client
    }
}

impl std::fmt::Debug for TelemetryInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryInterceptor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Validates `options` and attaches a telemetry interceptor to `turn`.
pub fn attach_telemetry(
    turn: &mut TurnContext,
    options: TelemetryOptions,
    sink: Arc<dyn TelemetrySink>,
) -> Result<Arc<TelemetryClient>, TelemetryConfigError> {
    let interceptor = TelemetryInterceptor::new(options, sink)?;
    Ok(interceptor.attach(turn))
}

#[derive(Clone)]
struct TelemetryHook {
    client: Arc<TelemetryClient>,
    options: TelemetryOptions,
}

#[async_trait]
impl OperationHook<Vec<Activity>, Vec<ResourceResponse>> for TelemetryHook {
    async fn handle(
        &self,
        _turn: &TurnContext,
        activities: Vec<Activity>,
        next: SendActivitiesNext<'_>,
    ) -> Result<Vec<ResourceResponse>, TurnError> {
        let snapshots = activities
            .iter()
            .filter_map(|activity| {
                capture(BOT_MESSAGE_SEND_EVENT, || {
                    Ok(sent_properties(activity, &self.options))
                })
            })
            .collect::<Vec<_>>();
        let responses = next.run(activities).await?;
        for properties in snapshots {
            emit(&self.client, BOT_MESSAGE_SEND_EVENT, properties);
        }
        Ok(responses)
    }
}

#[async_trait]
impl OperationHook<Activity, ResourceResponse> for TelemetryHook {
    async fn handle(
        &self,
        _turn: &TurnContext,
        activity: Activity,
        next: UpdateActivityNext<'_>,
    ) -> Result<ResourceResponse, TurnError> {
        let snapshot = capture(BOT_MESSAGE_UPDATE_EVENT, || {
            Ok(updated_properties(&activity, &self.options))
        });
        let response = next.run(activity).await?;
        if let Some(properties) = snapshot {
            emit(&self.client, BOT_MESSAGE_UPDATE_EVENT, properties);
        }
        Ok(response)
    }
}

#[async_trait]
impl OperationHook<ConversationReference, ()> for TelemetryHook {
    async fn handle(
        &self,
        _turn: &TurnContext,
        reference: ConversationReference,
        next: DeleteActivityNext<'_>,
    ) -> Result<(), TurnError> {
        let snapshot = capture(BOT_MESSAGE_DELETE_EVENT, || {
            let record = deleted_record(&reference);
            let view = record
                .as_message_delete()
                .ok_or_else(|| anyhow!("synthetic delete record has kind {}", record.kind()))?;
            Ok(deleted_properties(&view))
        });
        next.run(reference).await?;
        if let Some(properties) = snapshot {
            emit(&self.client, BOT_MESSAGE_DELETE_EVENT, properties);
        }
        Ok(())
    }
}

/// Builds the `messageDelete` record describing a deleted activity.
pub fn deleted_record(reference: &ConversationReference) -> Activity {
    let mut record = Activity::new(ActivityKind::MessageDelete.as_str())
        .apply_conversation_reference(reference, false);
    record.id = reference.activity_id.clone();
    record.reply_to_id = None;
    record
}

fn capture<F>(event: &str, build: F) -> Option<TelemetryProperties>
where
    F: FnOnce() -> Result<TelemetryProperties>,
{
    match catch_unwind(AssertUnwindSafe(build)) {
        Ok(Ok(properties)) => Some(properties),
        Ok(Err(error)) => {
            tracing::debug!(event, error = %error, "dropped telemetry event");
            None
        }
        Err(_) => {
            tracing::debug!(event, "dropped telemetry event after panic");
            None
        }
    }
}

fn emit(client: &TelemetryClient, event: &str, properties: TelemetryProperties) {
    match catch_unwind(AssertUnwindSafe(|| client.track_event(event, properties))) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::debug!(event, error = %error, "dropped telemetry event"),
        Err(_) => tracing::debug!(event, "dropped telemetry event after panic"),
    }
}

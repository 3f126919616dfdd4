use std::sync::Arc;

use anyhow::{Context, Result};
use parley_telemetry::{
    MemoryTelemetrySink, TelemetryEvent, TelemetryInterceptor, TelemetryOptions, TelemetrySink,
    TracingTelemetrySink,
};
use parley_turn::{DryRunRecord, DryRunTransport, TurnContext, TurnError};
use serde::{Deserialize, Serialize};

use crate::fixture::{ReplayFixture, ReplayOperation};

pub const TURN_REPLAY_REPORT_RECORD_TYPE: &str = "turn_replay_report_v1";
pub const TURN_REPLAY_REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayOperationOutcome {
    pub index: usize,
    pub op: String,
    pub status: ReplayStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayTransportRecord {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl From<&DryRunRecord> for ReplayTransportRecord {
    fn from(record: &DryRunRecord) -> Self {
        match record {
            DryRunRecord::Sent {
                activity,
                response_id,
            } => Self {
                op: "send".to_string(),
                activity_id: Some(response_id.clone()),
                reply_to_id: activity.reply_to_id.clone(),
            },
            DryRunRecord::Updated { activity } => Self {
                op: "update".to_string(),
                activity_id: activity.id.clone(),
                reply_to_id: activity.reply_to_id.clone(),
            },
            DryRunRecord::Deleted { reference } => Self {
                op: "delete".to_string(),
                activity_id: reference.activity_id.clone(),
                reply_to_id: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayReport {
    pub record_type: String,
    pub schema_version: u32,
    pub fixture: String,
    pub responded: bool,
    pub operations: Vec<ReplayOperationOutcome>,
    pub transport_records: Vec<ReplayTransportRecord>,
    pub telemetry_event_count: usize,
    pub telemetry_events: Vec<TelemetryEvent>,
}

impl ReplayReport {
    pub fn failed_operations(&self) -> usize {
        self.operations
            .iter()
            .filter(|outcome| outcome.status == ReplayStatus::Error)
            .count()
    }
}

/// Fans events out to the report's in-memory capture, the tracing log and an
/// optional extra sink. Only the extra sink's failure is reported.
struct ReplayTelemetrySink {
    memory: Arc<MemoryTelemetrySink>,
    extra: Option<Arc<dyn TelemetrySink>>,
}

impl TelemetrySink for ReplayTelemetrySink {
    fn track(&self, event: &TelemetryEvent) -> Result<()> {
        self.memory.track(event)?;
        TracingTelemetrySink.track(event)?;
        match &self.extra {
            Some(extra) => extra.track(event),
            None => Ok(()),
        }
    }
}

/// Runs `fixture` as one turn against a [`DryRunTransport`] with telemetry
/// attached.
///
/// Operation failures are recorded in the report and do not stop the replay;
/// only invalid telemetry options fail the call.
pub async fn replay_fixture(
    fixture: &ReplayFixture,
    options: TelemetryOptions,
    extra_sink: Option<Arc<dyn TelemetrySink>>,
) -> Result<ReplayReport> {
    let memory = Arc::new(MemoryTelemetrySink::new());
    let sink = Arc::new(ReplayTelemetrySink {
        memory: Arc::clone(&memory),
        extra: extra_sink,
    });
    let interceptor =
        TelemetryInterceptor::new(options, sink).context("invalid telemetry options")?;

    let transport = Arc::new(DryRunTransport::new());
    let mut turn = TurnContext::new(transport.clone(), fixture.inbound.clone());
    interceptor.attach(&mut turn);

    let mut operations = Vec::with_capacity(fixture.operations.len());
    for (index, operation) in fixture.operations.iter().enumerate() {
        let result = run_operation(&turn, operation).await;
        if let Err(error) = &result {
            tracing::warn!(
                index,
                op = operation.label(),
                error = %error,
                "replay operation failed"
            );
        }
        operations.push(outcome(index, operation, result));
    }

    let telemetry_events = memory.events();
    Ok(ReplayReport {
        record_type: TURN_REPLAY_REPORT_RECORD_TYPE.to_string(),
        schema_version: TURN_REPLAY_REPORT_SCHEMA_VERSION,
        fixture: fixture.name.clone(),
        responded: turn.responded(),
        operations,
        transport_records: transport
            .records()
            .iter()
            .map(ReplayTransportRecord::from)
            .collect(),
        telemetry_event_count: telemetry_events.len(),
        telemetry_events,
    })
}

async fn run_operation(
    turn: &TurnContext,
    operation: &ReplayOperation,
) -> Result<Vec<String>, TurnError> {
    match operation {
        ReplayOperation::Send { activities } => {
            let responses = turn.send_activities(activities.clone()).await?;
            Ok(responses.into_iter().map(|response| response.id).collect())
        }
        ReplayOperation::Update { activity } => {
            let response = turn.update_activity(activity.clone()).await?;
            Ok(vec![response.id])
        }
        ReplayOperation::Delete { activity_id } => {
            turn.delete_activity(activity_id).await?;
            Ok(Vec::new())
        }
    }
}

fn outcome(
    index: usize,
    operation: &ReplayOperation,
    result: Result<Vec<String>, TurnError>,
) -> ReplayOperationOutcome {
    let (status, response_ids, error) = match result {
        Ok(response_ids) => (ReplayStatus::Ok, response_ids, None),
        Err(error) => (ReplayStatus::Error, Vec::new(), Some(error.to_string())),
    };
    ReplayOperationOutcome {
        index,
        op: operation.label().to_string(),
        status,
        response_ids,
        error,
    }
}

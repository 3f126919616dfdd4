//! Transport seam: the real send/update/delete calls at the centre of each
//! operation pipeline.

use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parley_schema::{Activity, ConversationReference, ResourceResponse};

#[async_trait]
/// Trait contract for `ActivityTransport` behavior.
pub trait ActivityTransport: Send + Sync {
    async fn send_activities(&self, activities: Vec<Activity>) -> Result<Vec<ResourceResponse>>;
    async fn update_activity(&self, activity: Activity) -> Result<ResourceResponse>;
    async fn delete_activity(&self, reference: ConversationReference) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
/// One operation observed by [`DryRunTransport`].
pub enum DryRunRecord {
    Sent {
        activity: Activity,
        response_id: String,
    },
    Updated {
        activity: Activity,
    },
    Deleted {
        reference: ConversationReference,
    },
}

#[derive(Debug, Default)]
struct DryRunState {
    next_id: u64,
    records: Vec<DryRunRecord>,
    fail_with: Option<String>,
}

/// Transport that delivers nothing and records everything.
///
/// Sent activities receive ids `dry-run-1`, `dry-run-2`, ... in send order.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    state: Mutex<DryRunState>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        let transport = Self::new();
        transport.set_failure(Some(reason.into()));
        transport
    }

    pub fn set_failure(&self, reason: Option<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_with = reason;
        }
    }

    pub fn records(&self) -> Vec<DryRunRecord> {
        self.state
            .lock()
            .map(|state| state.records.clone())
            .unwrap_or_default()
    }

    fn with_state<T>(&self, apply: impl FnOnce(&mut DryRunState) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("dry-run transport state lock is poisoned"))?;
        if let Some(reason) = &state.fail_with {
            bail!("dry-run transport failure: {reason}");
        }
        apply(&mut *state)
    }
}

#[async_trait]
impl ActivityTransport for DryRunTransport {
    async fn send_activities(&self, activities: Vec<Activity>) -> Result<Vec<ResourceResponse>> {
        self.with_state(|state| {
            let mut responses = Vec::with_capacity(activities.len());
            for activity in activities {
                state.next_id = state.next_id.saturating_add(1);
                let response_id = format!("dry-run-{}", state.next_id);
                responses.push(ResourceResponse::new(response_id.clone()));
                state.records.push(DryRunRecord::Sent {
                    activity,
                    response_id,
                });
            }
            Ok(responses)
        })
    }

    async fn update_activity(&self, activity: Activity) -> Result<ResourceResponse> {
        self.with_state(|state| {
            let Some(id) = activity.id.clone().filter(|id| !id.trim().is_empty()) else {
                bail!("cannot update an activity without an id");
            };
            state.records.push(DryRunRecord::Updated { activity });
            Ok(ResourceResponse::new(id))
        })
    }

    async fn delete_activity(&self, reference: ConversationReference) -> Result<()> {
        self.with_state(|state| {
            state.records.push(DryRunRecord::Deleted { reference });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use parley_schema::{Activity, ConversationReference};

    use super::{ActivityTransport, DryRunRecord, DryRunTransport};

    #[tokio::test]
    async fn unit_send_assigns_sequential_ids_and_records_batch() {
        let transport = DryRunTransport::new();
        let responses = transport
            .send_activities(vec![Activity::message("a"), Activity::message("b")])
            .await
            .expect("send");
        let ids = responses.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["dry-run-1", "dry-run-2"]);
        assert_eq!(transport.records().len(), 2);
    }

    #[tokio::test]
    async fn unit_update_requires_activity_id() {
        let transport = DryRunTransport::new();
        let error = transport
            .update_activity(Activity::message("no id"))
            .await
            .expect_err("missing id");
        assert!(error.to_string().contains("without an id"));

        let mut activity = Activity::message("edited");
        activity.id = Some("m1".to_string());
        let response = transport.update_activity(activity).await.expect("update");
        assert_eq!(response.id, "m1");
    }

    #[tokio::test]
    async fn regression_failing_transport_rejects_every_operation() {
        let transport = DryRunTransport::failing("offline");
        let error = transport
            .delete_activity(ConversationReference::default())
            .await
            .expect_err("failing transport");
        assert!(error.to_string().contains("offline"));
        assert!(transport.records().is_empty());

        transport.set_failure(None);
        transport
            .delete_activity(ConversationReference::default().with_activity_id("a9"))
            .await
            .expect("recovered");
        assert!(matches!(
            transport.records().as_slice(),
            [DryRunRecord::Deleted { reference }] if reference.activity_id.as_deref() == Some("a9")
        ));
    }
}

use std::any::Any;
use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures_util::FutureExt;
use parley_schema::{Activity, ActivityKind, ConversationReference, ResourceResponse};

use crate::pipeline::{
    DeleteActivityPipeline, OperationHook, SendActivitiesPipeline, UpdateActivityPipeline,
};
use crate::{ActivityTransport, TurnCancellationToken, TurnError, TurnServices};

/// State for one request/response cycle with a conversation partner.
///
/// Hooks and services are registered through `&mut self` during turn setup;
/// operations run through `&self`, so the hook chains cannot change while an
/// operation is in flight.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use parley_schema::{Activity, ChannelAccount, ConversationAccount};
/// use parley_turn::{DryRunTransport, TurnContext};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), parley_turn::TurnError> {
/// let inbound = Activity {
///     id: Some("in-1".to_string()),
///     from: Some(ChannelAccount::new("u1")),
///     conversation: Some(ConversationAccount::new("c1")),
///     ..Activity::message("hi")
/// };
/// let turn = TurnContext::new(Arc::new(DryRunTransport::new()), Some(inbound));
/// let response = turn.send_activity(Activity::message("hello")).await?;
/// assert_eq!(response.map(|r| r.id), Some("dry-run-1".to_string()));
/// assert!(turn.responded());
/// # Ok(())
/// # }
/// ```
pub struct TurnContext {
    activity: Option<Activity>,
    activity_kind: Option<ActivityKind>,
    transport: Arc<dyn ActivityTransport>,
    services: TurnServices,
    send_pipeline: SendActivitiesPipeline,
    update_pipeline: UpdateActivityPipeline,
    delete_pipeline: DeleteActivityPipeline,
    cancellation_token: TurnCancellationToken,
    responded: Arc<AtomicBool>,
}

impl TurnContext {
    /// Creates a turn around `activity`; pass `None` for proactive turns.
    pub fn new(transport: Arc<dyn ActivityTransport>, activity: Option<Activity>) -> Self {
        let activity_kind = activity.as_ref().map(Activity::kind);
        Self {
            activity,
            activity_kind,
            transport,
            services: TurnServices::new(),
            send_pipeline: SendActivitiesPipeline::new("send_activities"),
            update_pipeline: UpdateActivityPipeline::new("update_activity"),
            delete_pipeline: DeleteActivityPipeline::new("delete_activity"),
            cancellation_token: TurnCancellationToken::new(),
            responded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancellation_token(mut self, token: TurnCancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// The inbound activity, absent for proactive turns.
    pub fn activity(&self) -> Option<&Activity> {
        self.activity.as_ref()
    }

    /// Kind of the inbound activity, resolved once when the turn was created.
    pub fn activity_kind(&self) -> Option<ActivityKind> {
        self.activity_kind
    }

    pub fn cancellation_token(&self) -> &TurnCancellationToken {
        &self.cancellation_token
    }

    /// True once a batch containing a non-`trace` activity has been delivered.
    pub fn responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }

    pub fn services(&self) -> &TurnServices {
        &self.services
    }

    /// Stores `value` in the turn's keyed store, replacing any previous value under `key`.
    pub fn attach<T>(&mut self, key: impl Into<String>, value: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let key = key.into();
        if self.services.insert(key.clone(), value) {
            tracing::debug!(service = key.as_str(), "replaced turn service");
        }
    }

    pub fn service<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.services.get(key)
    }

    pub fn on_send<H>(&mut self, hook: H)
    where
        H: OperationHook<Vec<Activity>, Vec<ResourceResponse>> + 'static,
    {
        self.send_pipeline.register(Arc::new(hook));
    }

    pub fn on_update<H>(&mut self, hook: H)
    where
        H: OperationHook<Activity, ResourceResponse> + 'static,
    {
        self.update_pipeline.register(Arc::new(hook));
    }

    pub fn on_delete<H>(&mut self, hook: H)
    where
        H: OperationHook<ConversationReference, ()> + 'static,
    {
        self.delete_pipeline.register(Arc::new(hook));
    }

    pub fn send_pipeline(&self) -> &SendActivitiesPipeline {
        &self.send_pipeline
    }

    pub fn update_pipeline(&self) -> &UpdateActivityPipeline {
        &self.update_pipeline
    }

    pub fn delete_pipeline(&self) -> &DeleteActivityPipeline {
        &self.delete_pipeline
    }

    /// Sends `activities` through the send pipeline and the transport.
    pub async fn send_activities(
        &self,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>, TurnError> {
        let activities = activities
            .into_iter()
            .enumerate()
            .map(|(index, activity)| self.prepare_outbound(index, activity))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            activities = activities.len(),
            hooks = self.send_pipeline.len(),
            "sending activities"
        );

        let transport = Arc::clone(&self.transport);
        let token = self.cancellation_token.clone();
        let responded = Arc::clone(&self.responded);
        let terminal = move |batch: Vec<Activity>| {
            let transport = Arc::clone(&transport);
            let token = token.clone();
            let responded = Arc::clone(&responded);
            async move {
                let replies = batch
                    .iter()
                    .any(|activity| activity.kind() != ActivityKind::Trace);
                let responses = run_cancellable(&token, transport.send_activities(batch)).await?;
                if replies {
                    responded.store(true, Ordering::SeqCst);
                }
                Ok::<_, TurnError>(responses)
            }
            .boxed()
        };
        self.send_pipeline.invoke(self, activities, &terminal).await
    }

    /// Sends a single activity, returning the transport's response for it.
    pub async fn send_activity(
        &self,
        activity: Activity,
    ) -> Result<Option<ResourceResponse>, TurnError> {
        let responses = self.send_activities(vec![activity]).await?;
        Ok(responses.into_iter().next())
    }

    /// Replaces a previously sent activity through the update pipeline.
    pub async fn update_activity(&self, activity: Activity) -> Result<ResourceResponse, TurnError> {
        let activity = self.prepare_outbound(0, activity)?;
        tracing::debug!(hooks = self.update_pipeline.len(), "updating activity");

        let transport = Arc::clone(&self.transport);
        let token = self.cancellation_token.clone();
        let terminal = move |activity: Activity| {
            let transport = Arc::clone(&transport);
            let token = token.clone();
            async move { run_cancellable(&token, transport.update_activity(activity)).await }.boxed()
        };
        self.update_pipeline.invoke(self, activity, &terminal).await
    }

    /// Deletes `activity_id` from the inbound activity's conversation.
    pub async fn delete_activity(&self, activity_id: &str) -> Result<(), TurnError> {
        let reference = self
            .activity
            .as_ref()
            .map(|activity| activity.conversation_reference().with_activity_id(activity_id))
            .ok_or(TurnError::MissingConversationReference)?;
        self.delete_activity_reference(reference).await
    }

    /// Deletes the activity addressed by `reference` through the delete pipeline.
    pub async fn delete_activity_reference(
        &self,
        reference: ConversationReference,
    ) -> Result<(), TurnError> {
        tracing::debug!(hooks = self.delete_pipeline.len(), "deleting activity");

        let transport = Arc::clone(&self.transport);
        let token = self.cancellation_token.clone();
        let terminal = move |reference: ConversationReference| {
            let transport = Arc::clone(&transport);
            let token = token.clone();
            async move { run_cancellable(&token, transport.delete_activity(reference)).await }
                .boxed()
        };
        self.delete_pipeline.invoke(self, reference, &terminal).await
    }

    fn prepare_outbound(&self, index: usize, activity: Activity) -> Result<Activity, TurnError> {
        if !activity.has_discriminator() {
            return Err(TurnError::InvalidActivity {
                index,
                reason: "activity type cannot be empty".to_string(),
            });
        }
        Ok(match &self.activity {
            Some(inbound) => {
                activity.apply_conversation_reference(&inbound.conversation_reference(), false)
            }
            None => activity,
        })
    }
}

async fn run_cancellable<T, F>(token: &TurnCancellationToken, operation: F) -> Result<T, TurnError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    if token.is_cancelled() {
        return Err(TurnError::Cancelled);
    }
    // A call that has already completed wins over a cancel observed in the same poll.
    tokio::select! {
        biased;
        result = operation => result.map_err(TurnError::Transport),
        _ = token.cancelled() => Err(TurnError::Cancelled),
    }
}

//! Onion-ordered interception chain around one mutating turn operation.
//!
//! A pipeline holds hooks in registration order. Invoking it builds the chain
//! fresh: the first hook receives a [`Next`] that runs the second hook, and so
//! on, with the terminal operation at the innermost position. Pre-phases run
//! first-to-last, post-phases last-to-first.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use parley_schema::{Activity, ConversationReference, ResourceResponse};

use crate::{TurnContext, TurnError};

/// The real operation at the centre of a pipeline (usually a transport call).
pub type TerminalOperation<Req, Res> =
    dyn Fn(Req) -> BoxFuture<'static, Result<Res, TurnError>> + Send + Sync;

/// Interceptor around one operation kind.
///
/// A hook may inspect or replace `request` before calling `next.run(..)`,
/// inspect or replace the result afterwards, call `next.run(..)` more than
/// once, or not at all to short-circuit the rest of the chain.
#[async_trait]
pub trait OperationHook<Req, Res>: Send + Sync
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    async fn handle(
        &self,
        turn: &TurnContext,
        request: Req,
        next: Next<'_, Req, Res>,
    ) -> Result<Res, TurnError>;
}

/// Continuation handed to a hook: "run the rest of the chain".
pub struct Next<'a, Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    hooks: &'a [Arc<dyn OperationHook<Req, Res>>],
    turn: &'a TurnContext,
    terminal: &'a TerminalOperation<Req, Res>,
}

impl<Req, Res> Clone for Next<'_, Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<Req, Res> Copy for Next<'_, Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
}

impl<'a, Req, Res> Next<'a, Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Runs the remaining hooks, then the terminal operation.
    pub async fn run(&self, request: Req) -> Result<Res, TurnError> {
        match self.hooks.split_first() {
            Some((hook, remaining)) => {
                let next = Next {
                    hooks: remaining,
                    turn: self.turn,
                    terminal: self.terminal,
                };
                hook.handle(self.turn, request, next).await
            }
            None => (self.terminal)(request).await,
        }
    }

    /// Number of hooks still ahead of the terminal operation.
    pub fn remaining_hooks(&self) -> usize {
        self.hooks.len()
    }
}

/// Ordered hook chain for one operation kind.
pub struct OperationPipeline<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    name: &'static str,
    hooks: Vec<Arc<dyn OperationHook<Req, Res>>>,
}

impl<Req, Res> OperationPipeline<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            hooks: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Appends `hook`; hooks run in the order they were registered.
    pub fn register(&mut self, hook: Arc<dyn OperationHook<Req, Res>>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs `request` through every registered hook around `terminal`.
    pub async fn invoke(
        &self,
        turn: &TurnContext,
        request: Req,
        terminal: &TerminalOperation<Req, Res>,
    ) -> Result<Res, TurnError> {
        if self.hooks.is_empty() {
            tracing::trace!(operation = self.name, "pipeline has no hooks");
            return terminal(request).await;
        }
        tracing::trace!(
            operation = self.name,
            hooks = self.hooks.len(),
            "running operation pipeline"
        );
        Next {
            hooks: &self.hooks,
            turn,
            terminal,
        }
        .run(request)
        .await
    }
}

pub type SendActivitiesPipeline = OperationPipeline<Vec<Activity>, Vec<ResourceResponse>>;
pub type UpdateActivityPipeline = OperationPipeline<Activity, ResourceResponse>;
pub type DeleteActivityPipeline = OperationPipeline<ConversationReference, ()>;

pub type SendActivitiesNext<'a> = Next<'a, Vec<Activity>, Vec<ResourceResponse>>;
pub type UpdateActivityNext<'a> = Next<'a, Activity, ResourceResponse>;
pub type DeleteActivityNext<'a> = Next<'a, ConversationReference, ()>;

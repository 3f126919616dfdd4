//! Per-turn state and interception pipelines for parley conversations.
//!
//! A [`TurnContext`] carries the inbound activity, a keyed service store and
//! three [`OperationPipeline`]s (send, update, delete). Observers register
//! [`OperationHook`]s during turn setup; each operation then runs every hook
//! in onion order around the [`ActivityTransport`] call.

pub mod cancellation;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod transport;
pub mod turn_context;

pub use cancellation::TurnCancellationToken;
pub use error::TurnError;
pub use pipeline::*;
pub use services::TurnServices;
pub use transport::{ActivityTransport, DryRunRecord, DryRunTransport};
pub use turn_context::TurnContext;

use thiserror::Error;

/// Enumerates supported `TurnError` values.
///
/// Errors raised inside an operation pipeline reach the caller of
/// `send_activities`/`update_activity`/`delete_activity_reference` unchanged.
/// Only the transport call produces `Transport`; hooks report through
/// [`TurnError::hook`].
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Transport(anyhow::Error),
    #[error("turn operation cancelled")]
    Cancelled,
    #[error("outbound activity at index {index} is invalid: {reason}")]
    InvalidActivity { index: usize, reason: String },
    #[error("turn has no inbound activity to derive a conversation reference from")]
    MissingConversationReference,
    #[error("hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },
}

impl TurnError {
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

//! Discriminator resolution and kind-specific views over [`Activity`].
//!
//! The wire `type` string is open-ended: channels add new kinds over time. The
//! resolver maps the known discriminators through a static table and sends
//! everything else to [`ActivityKind::Generic`]; it never fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity::{Activity, ChannelAccount, ConversationAccount};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
/// Enumerates supported `ActivityKind` values.
pub enum ActivityKind {
    Message,
    ContactRelationUpdate,
    ConversationUpdate,
    Typing,
    Ping,
    EndOfConversation,
    Event,
    Invoke,
    DeleteUserData,
    MessageUpdate,
    MessageDelete,
    InstallationUpdate,
    MessageReaction,
    Suggestion,
    Trace,
    /// Catch-all for discriminators outside the known set.
    Generic,
}

const ACTIVITY_KIND_TABLE: &[(&str, ActivityKind)] = &[
    ("message", ActivityKind::Message),
    ("contactRelationUpdate", ActivityKind::ContactRelationUpdate),
    ("conversationUpdate", ActivityKind::ConversationUpdate),
    ("typing", ActivityKind::Typing),
    ("ping", ActivityKind::Ping),
    ("endOfConversation", ActivityKind::EndOfConversation),
    ("event", ActivityKind::Event),
    ("invoke", ActivityKind::Invoke),
    ("deleteUserData", ActivityKind::DeleteUserData),
    ("messageUpdate", ActivityKind::MessageUpdate),
    ("messageDelete", ActivityKind::MessageDelete),
    ("installationUpdate", ActivityKind::InstallationUpdate),
    ("messageReaction", ActivityKind::MessageReaction),
    ("suggestion", ActivityKind::Suggestion),
    ("trace", ActivityKind::Trace),
];

impl ActivityKind {
    /// Every kind with a wire discriminator, in table order.
    pub fn known() -> impl Iterator<Item = ActivityKind> {
        ACTIVITY_KIND_TABLE.iter().map(|(_, kind)| *kind)
    }

    /// Stable wire discriminator; [`ActivityKind::Generic`] has none and
    /// renders as an empty string.
    pub fn as_str(self) -> &'static str {
        ACTIVITY_KIND_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(discriminator, _)| *discriminator)
            .unwrap_or("")
    }

    pub fn is_generic(self) -> bool {
        self == Self::Generic
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generic => f.write_str("generic"),
            kind => f.write_str(kind.as_str()),
        }
    }
}

/// Maps an activity `type` discriminator to its [`ActivityKind`].
///
/// Matching is exact and case-sensitive. Unknown and empty discriminators
/// resolve to [`ActivityKind::Generic`].
pub fn resolve_activity_kind(discriminator: &str) -> ActivityKind {
    ACTIVITY_KIND_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == discriminator)
        .map(|(_, kind)| *kind)
        .unwrap_or(ActivityKind::Generic)
}

/// Text-bearing view shared by `message` and `messageUpdate` activities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageView<'a> {
    pub text: Option<&'a str>,
    pub locale: Option<&'a str>,
    pub delivery_mode: Option<&'a str>,
}

/// View of a `messageDelete` activity: the target id plus its addressing.
/// Text, locale and display names are not meaningful here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageDeleteView<'a> {
    pub id: Option<&'a str>,
    pub channel_id: Option<&'a str>,
    pub recipient: Option<&'a ChannelAccount>,
    pub conversation: Option<&'a ConversationAccount>,
}

/// Named-value view shared by `event` and `invoke` activities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NamedValueView<'a> {
    pub name: Option<&'a str>,
    pub value: Option<&'a Value>,
    pub relates_to_id: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceView<'a> {
    pub name: Option<&'a str>,
    pub label: Option<&'a str>,
    pub value_type: Option<&'a str>,
    pub value: Option<&'a Value>,
}

/// Strongly-shaped view over an [`Activity`], selected by its resolved kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivityView<'a> {
    Message(MessageView<'a>),
    MessageUpdate(MessageView<'a>),
    MessageDelete(MessageDeleteView<'a>),
    Event(NamedValueView<'a>),
    Invoke(NamedValueView<'a>),
    Trace(TraceView<'a>),
    /// Known kinds that carry no fields beyond the common envelope.
    Other(ActivityKind),
    Generic(&'a Activity),
}

impl<'a> ActivityView<'a> {
    pub(crate) fn of(activity: &'a Activity) -> Self {
        match activity.kind() {
            ActivityKind::Message => Self::Message(message_view(activity)),
            ActivityKind::MessageUpdate => Self::MessageUpdate(message_view(activity)),
            ActivityKind::MessageDelete => Self::MessageDelete(MessageDeleteView {
                id: activity.id.as_deref(),
                channel_id: activity.channel_id.as_deref(),
                recipient: activity.recipient.as_ref(),
                conversation: activity.conversation.as_ref(),
            }),
            ActivityKind::Event => Self::Event(named_value_view(activity)),
            ActivityKind::Invoke => Self::Invoke(named_value_view(activity)),
            ActivityKind::Trace => Self::Trace(TraceView {
                name: activity.name.as_deref(),
                label: activity.label.as_deref(),
                value_type: activity.value_type.as_deref(),
                value: activity.value.as_ref(),
            }),
            ActivityKind::Generic => Self::Generic(activity),
            other => Self::Other(other),
        }
    }

    pub fn kind(&self) -> ActivityKind {
        match self {
            Self::Message(_) => ActivityKind::Message,
            Self::MessageUpdate(_) => ActivityKind::MessageUpdate,
            Self::MessageDelete(_) => ActivityKind::MessageDelete,
            Self::Event(_) => ActivityKind::Event,
            Self::Invoke(_) => ActivityKind::Invoke,
            Self::Trace(_) => ActivityKind::Trace,
            Self::Other(kind) => *kind,
            Self::Generic(_) => ActivityKind::Generic,
        }
    }
}

fn message_view(activity: &Activity) -> MessageView<'_> {
    MessageView {
        text: activity.text.as_deref(),
        locale: activity.locale.as_deref(),
        delivery_mode: activity.delivery_mode.as_deref(),
    }
}

fn named_value_view(activity: &Activity) -> NamedValueView<'_> {
    NamedValueView {
        name: activity.name.as_deref(),
        value: activity.value.as_ref(),
        relates_to_id: activity.reply_to_id.as_deref(),
    }
}

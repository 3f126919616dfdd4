//! Property maps for the four message lifecycle events.
//!
//! Addressing fields (activity id, channel, conversation, the counterpart's
//! id and, where the activity carries one, locale) are always present and
//! become an empty string when the activity does not carry them. Display
//! names and message text are personal data and only appear when the
//! matching [`TelemetryOptions`] flag is set and the value is non-blank.

use parley_schema::{Activity, ChannelAccount, ConversationAccount, MessageDeleteView};

use crate::client::TelemetryProperties;
use crate::options::TelemetryOptions;

pub const ACTIVITY_ID_PROPERTY: &str = "ActivityId";
pub const CHANNEL_PROPERTY: &str = "Channel";
pub const FROM_ID_PROPERTY: &str = "FromId";
pub const FROM_NAME_PROPERTY: &str = "FromName";
pub const RECIPIENT_ID_PROPERTY: &str = "RecipientId";
pub const RECIPIENT_NAME_PROPERTY: &str = "RecipientName";
pub const CONVERSATION_ID_PROPERTY: &str = "ConversationId";
pub const CONVERSATION_NAME_PROPERTY: &str = "ConversationName";
pub const TEXT_PROPERTY: &str = "Text";
pub const LOCALE_PROPERTY: &str = "Locale";

#[derive(Default)]
struct PropertyBag(TelemetryProperties);

impl PropertyBag {
    fn always(mut self, key: &str, value: Option<&str>) -> Self {
        self.0
            .insert(key.to_string(), value.unwrap_or_default().to_string());
        self
    }

    fn opt_in(mut self, enabled: bool, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|value| enabled && !value.trim().is_empty()) {
            self.0.insert(key.to_string(), value.to_string());
        }
        self
    }

    fn addressing(self, activity_id: Option<&str>, channel_id: Option<&str>) -> Self {
        self.always(ACTIVITY_ID_PROPERTY, activity_id)
            .always(CHANNEL_PROPERTY, channel_id)
    }

    fn conversation(self, conversation: Option<&ConversationAccount>) -> Self {
        self.always(
            CONVERSATION_ID_PROPERTY,
            conversation.map(|conversation| conversation.id.as_str()),
        )
        .always(
            CONVERSATION_NAME_PROPERTY,
            conversation.and_then(|conversation| conversation.name.as_deref()),
        )
    }

    fn finish(self) -> TelemetryProperties {
        self.0
    }
}

fn account_id(account: Option<&ChannelAccount>) -> Option<&str> {
    account.map(|account| account.id.as_str())
}

fn account_name(account: Option<&ChannelAccount>) -> Option<&str> {
    account.and_then(|account| account.name.as_deref())
}

/// Properties for an inbound message; the counterpart is the sender.
pub fn received_properties(activity: &Activity, options: &TelemetryOptions) -> TelemetryProperties {
    PropertyBag::default()
        .addressing(activity.id.as_deref(), activity.channel_id.as_deref())
        .always(FROM_ID_PROPERTY, account_id(activity.from.as_ref()))
        .opt_in(
            options.include_sender_name,
            FROM_NAME_PROPERTY,
            account_name(activity.from.as_ref()),
        )
        .conversation(activity.conversation.as_ref())
        .always(LOCALE_PROPERTY, activity.locale.as_deref())
        .opt_in(
            options.include_original_text,
            TEXT_PROPERTY,
            activity.text.as_deref(),
        )
        .finish()
}

/// Properties for one outgoing message; the counterpart is the recipient.
pub fn sent_properties(activity: &Activity, options: &TelemetryOptions) -> TelemetryProperties {
    PropertyBag::default()
        .addressing(activity.id.as_deref(), activity.channel_id.as_deref())
        .always(RECIPIENT_ID_PROPERTY, account_id(activity.recipient.as_ref()))
        .opt_in(
            options.include_sender_name,
            RECIPIENT_NAME_PROPERTY,
            account_name(activity.recipient.as_ref()),
        )
        .conversation(activity.conversation.as_ref())
        .always(LOCALE_PROPERTY, activity.locale.as_deref())
        .opt_in(
            options.include_original_text,
            TEXT_PROPERTY,
            activity.text.as_deref(),
        )
        .finish()
}

/// Properties for an updated message. Display names are never included.
pub fn updated_properties(activity: &Activity, options: &TelemetryOptions) -> TelemetryProperties {
    PropertyBag::default()
        .addressing(activity.id.as_deref(), activity.channel_id.as_deref())
        .always(RECIPIENT_ID_PROPERTY, account_id(activity.recipient.as_ref()))
        .conversation(activity.conversation.as_ref())
        .always(LOCALE_PROPERTY, activity.locale.as_deref())
        .opt_in(
            options.include_original_text,
            TEXT_PROPERTY,
            activity.text.as_deref(),
        )
        .finish()
}

/// Properties for a deleted message. Deletes carry addressing only.
pub fn deleted_properties(view: &MessageDeleteView<'_>) -> TelemetryProperties {
    PropertyBag::default()
        .addressing(view.id, view.channel_id)
        .always(RECIPIENT_ID_PROPERTY, account_id(view.recipient))
        .conversation(view.conversation)
        .finish()
}

#[cfg(test)]
mod tests {
    use parley_schema::{Activity, ChannelAccount, ConversationAccount, ConversationReference};

    use super::{deleted_properties, received_properties, sent_properties, updated_properties};
    use crate::options::TelemetryOptions;

    fn keys(properties: &super::TelemetryProperties) -> Vec<&str> {
        properties.keys().map(String::as_str).collect()
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

    #[test]
    fn unit_received_properties_exclude_personal_data_by_default() {
        let properties = received_properties(&inbound(), &TelemetryOptions::new("k"));
        assert_eq!(
            keys(&properties),
            vec![
                "ActivityId",
                "Channel",
                "ConversationId",
                "ConversationName",
                "FromId",
                "Locale"
            ]
        );
        assert_eq!(properties["FromId"], "u1");
        assert_eq!(properties["ConversationName"], "Lobby");
        assert_eq!(properties["Locale"], "en-US");
    }

    #[test]
    fn unit_received_properties_include_opted_in_name_and_text() {
        let options = TelemetryOptions::new("k")
            .with_sender_name(true)
            .with_original_text(true);
        let properties = received_properties(&inbound(), &options);
        assert_eq!(properties.len(), 8);
        assert_eq!(properties["FromName"], "Alice");
        assert_eq!(properties["Text"], "hi");
    }

    #[test]
    fn unit_blank_opt_in_values_are_omitted_and_always_fields_default_to_empty() {
        let options = TelemetryOptions::new("k")
            .with_sender_name(true)
            .with_original_text(true);
        let activity = Activity {
            from: Some(ChannelAccount::named("u1", "  ")),
            ..Activity::message("")
        };
        let properties = received_properties(&activity, &options);
        assert!(!properties.contains_key("FromName"));
        assert!(!properties.contains_key("Text"));
        assert_eq!(properties["ActivityId"], "");
        assert_eq!(properties["ConversationName"], "");
        assert_eq!(properties["Locale"], "");
    }

    #[test]
    fn unit_sent_properties_describe_the_recipient() {
        let outbound = Activity::message("hello").apply_conversation_reference(
            &inbound().conversation_reference(),
            false,
        );
        let options = TelemetryOptions::new("k").with_sender_name(true);
        let properties = sent_properties(&outbound, &options);
        assert_eq!(properties["RecipientId"], "u1");
        assert_eq!(properties["RecipientName"], "Alice");
        assert!(!properties.contains_key("FromId"));
        assert!(!properties.contains_key("Text"));
    }

    #[test]
    fn unit_updated_properties_never_carry_names() {
        let options = TelemetryOptions::new("k")
            .with_sender_name(true)
            .with_original_text(true);
        let mut update = Activity::new("messageUpdate")
            .apply_conversation_reference(&inbound().conversation_reference(), false);
        update.id = Some("out-1".to_string());
        update.text = Some("edited".to_string());
        let properties = updated_properties(&update, &options);
        assert_eq!(
            keys(&properties),
            vec![
                "ActivityId",
                "Channel",
                "ConversationId",
                "ConversationName",
                "Locale",
                "RecipientId",
                "Text"
            ]
        );
        assert_eq!(properties["Text"], "edited");
    }

    #[test]
    fn unit_deleted_properties_are_addressing_only() {
        let reference = ConversationReference {
            conversation: Some(ConversationAccount::new("c1")),
            user: Some(ChannelAccount::named("u1", "Alice")),
            ..ConversationReference::default()
        }
        .with_activity_id("a9");
        let mut record =
            Activity::new("messageDelete").apply_conversation_reference(&reference, false);
        record.id = reference.activity_id.clone();
        let view = record.as_message_delete().expect("delete view");
        let properties = deleted_properties(&view);
        assert_eq!(
            keys(&properties),
            vec![
                "ActivityId",
                "Channel",
                "ConversationId",
                "ConversationName",
                "RecipientId"
            ]
        );
        assert_eq!(properties["ActivityId"], "a9");
        assert_eq!(properties["ConversationId"], "c1");
        assert_eq!(properties["RecipientId"], "u1");
    }
}

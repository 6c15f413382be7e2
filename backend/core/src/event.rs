//! Inbound platform events.
//!
//! Platforms post a loosely shaped JSON document ([`InboundEvent`]). It is
//! validated once at the boundary into an [`Event`] whose [`EventKind`] carries
//! the data each dispatch branch needs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::outcome::Rejection;
use crate::types::TranslationResult;

// ---------------------------------------------------------------------------
// Message type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "chatMessage")]
    ChatMessage,
    #[serde(rename = "slashCommand")]
    SlashCommand,
    #[serde(rename = "interaction")]
    Interaction,
    #[serde(rename = "modal_submit")]
    ModalSubmit,
    #[serde(rename = "button_click")]
    ButtonClick,
    #[serde(rename = "select_menu")]
    SelectMenu,
    #[serde(rename = "stream_online")]
    StreamOnline,
    #[serde(rename = "stream_offline")]
    StreamOffline,
    #[serde(rename = "subscription")]
    Subscription,
    #[serde(rename = "gift_subscription")]
    GiftSubscription,
    #[serde(rename = "follow")]
    Follow,
    #[serde(rename = "raid")]
    Raid,
    #[serde(rename = "cheer")]
    Cheer,
}

impl MessageType {
    pub const ALL: [MessageType; 13] = [
        Self::ChatMessage,
        Self::SlashCommand,
        Self::Interaction,
        Self::ModalSubmit,
        Self::ButtonClick,
        Self::SelectMenu,
        Self::StreamOnline,
        Self::StreamOffline,
        Self::Subscription,
        Self::GiftSubscription,
        Self::Follow,
        Self::Raid,
        Self::Cheer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatMessage => "chatMessage",
            Self::SlashCommand => "slashCommand",
            Self::Interaction => "interaction",
            Self::ModalSubmit => "modal_submit",
            Self::ButtonClick => "button_click",
            Self::SelectMenu => "select_menu",
            Self::StreamOnline => "stream_online",
            Self::StreamOffline => "stream_offline",
            Self::Subscription => "subscription",
            Self::GiftSubscription => "gift_subscription",
            Self::Follow => "follow",
            Self::Raid => "raid",
            Self::Cheer => "cheer",
        }
    }

    /// Parse a wire tag. Returns `None` for tags this hub does not know.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    pub fn is_interaction(&self) -> bool {
        matches!(
            self,
            Self::Interaction | Self::ModalSubmit | Self::ButtonClick | Self::SelectMenu
        )
    }

    pub fn is_stream_event(&self) -> bool {
        matches!(
            self,
            Self::StreamOnline
                | Self::StreamOffline
                | Self::Subscription
                | Self::GiftSubscription
                | Self::Follow
                | Self::Raid
                | Self::Cheer
        )
    }

    /// Reputation event name for types that affect a user's reputation.
    pub fn reputation_event(&self) -> Option<&'static str> {
        match self {
            Self::ChatMessage => Some("message"),
            Self::Subscription => Some("subscription"),
            Self::GiftSubscription => Some("gift_subscription"),
            Self::Follow => Some("follow"),
            Self::Raid => Some("raid"),
            Self::Cheer => Some("cheer"),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// One slash-command option as sent by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl SlashOption {
    /// Option value rendered as plain text (strings unquoted).
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Event metadata: well-known keys are typed, everything else lands in `extra`.
///
/// Deserialization never fails: a known key whose value has an unexpected
/// shape is kept verbatim in `extra` instead of its typed field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SlashOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<TranslationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_message: Option<String>,
    /// Bits cheered or subscriptions gifted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// Raid size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewers: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self::from_map(map)),
            _ => Ok(Self::default()),
        }
    }
}

impl Metadata {
    fn from_map(map: serde_json::Map<String, Value>) -> Self {
        let mut meta = Self::default();
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            let leftover = match key.as_str() {
                "options" => lenient_options(value).map(|o| meta.options = o).err(),
                "custom_id" => lenient_text(value).map(|v| meta.custom_id = Some(v)).err(),
                "tier" => lenient_text(value).map(|v| meta.tier = Some(v)).err(),
                "original_message" => match value {
                    Value::String(s) => {
                        meta.original_message = Some(s);
                        None
                    }
                    other => Some(other),
                },
                "amount" => lenient_count(value).map(|v| meta.amount = Some(v)).err(),
                "viewers" => lenient_count(value).map(|v| meta.viewers = Some(v)).err(),
                "translation" => match serde_json::from_value(value.clone()) {
                    Ok(result) => {
                        meta.translation = Some(result);
                        None
                    }
                    Err(_) => Some(value),
                },
                _ => Some(value),
            };
            if let Some(value) = leftover {
                meta.extra.insert(key, value);
            }
        }
        meta
    }
}

/// Platforms send options either as `[{name, value}]` or as `{name: value}`.
fn lenient_options(value: Value) -> Result<Vec<SlashOption>, Value> {
    match value {
        Value::Array(_) => serde_json::from_value(value.clone()).map_err(|_| value),
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(name, value)| SlashOption { name, value })
            .collect()),
        other => Err(other),
    }
}

/// Strings as-is; numbers and booleans rendered (`tier: 1000`, numeric ids).
fn lenient_text(value: Value) -> Result<String, Value> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(other),
    }
}

/// Non-negative integers, also when sent as a numeric string.
fn lenient_count(value: Value) -> Result<u64, Value> {
    let parsed = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or(value)
}

/// Accepts strings, numbers (platform snowflake ids) and null.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Wire event
// ---------------------------------------------------------------------------

/// The normalized JSON event as received from a platform adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub entity_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub platform: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub channel_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message_type: String,
    #[serde(default)]
    pub metadata: Metadata,
}

// ---------------------------------------------------------------------------
// Validated event
// ---------------------------------------------------------------------------

/// Branch-specific data extracted at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    ChatMessage,
    SlashCommand { options: Vec<SlashOption> },
    /// Button, modal or select-menu interaction.
    Interaction { custom_id: String },
    Stream,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub entity_id: String,
    pub user_id: String,
    pub username: String,
    pub platform: String,
    pub channel_id: String,
    pub message: String,
    pub message_type: MessageType,
    /// The tag as received; differs from `message_type` when an unknown tag fell back to chat.
    pub raw_type: String,
    #[serde(skip_serializing)]
    pub kind: EventKind,
    pub metadata: Metadata,
}

impl Event {
    /// Validate a wire event. Unknown `message_type` tags are treated as chat messages.
    pub fn from_inbound(raw: InboundEvent) -> Result<Self, Rejection> {
        let entity_id = raw.entity_id.trim().to_string();
        if entity_id.is_empty() {
            return Err(Rejection::MissingEntity);
        }

        let message_type = MessageType::parse(&raw.message_type).unwrap_or(MessageType::ChatMessage);
        let mut metadata = raw.metadata;
        let kind = match message_type {
            MessageType::SlashCommand => EventKind::SlashCommand {
                options: std::mem::take(&mut metadata.options),
            },
            t if t.is_interaction() => EventKind::Interaction {
                custom_id: metadata
                    .custom_id
                    .clone()
                    .unwrap_or_else(|| raw.message.clone()),
            },
            t if t.is_stream_event() => EventKind::Stream,
            _ => EventKind::ChatMessage,
        };

        Ok(Self {
            entity_id,
            user_id: raw.user_id,
            username: raw.username,
            platform: raw.platform,
            channel_id: raw.channel_id,
            message: raw.message,
            message_type,
            raw_type: raw.message_type,
            kind,
            metadata,
        })
    }

    /// Replace the message with its translation, keeping the original in metadata.
    pub fn apply_translation(&mut self, result: TranslationResult) {
        let translated = result.translated_text.clone();
        self.metadata.original_message = Some(std::mem::replace(&mut self.message, translated));
        self.metadata.translation = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inbound(value: Value) -> InboundEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn message_type_tags_round_trip_through_parse() {
        for t in MessageType::ALL {
            assert_eq!(MessageType::parse(t.as_str()), Some(t));
        }
        assert_eq!(MessageType::parse("whisper"), None);
    }

    #[test]
    fn missing_entity_is_rejected() {
        let raw = inbound(json!({"user_id": "u1", "message": "!help", "message_type": "chatMessage"}));
        assert_eq!(Event::from_inbound(raw), Err(Rejection::MissingEntity));

        let raw = inbound(json!({"entity_id": null, "message": "hi"}));
        assert_eq!(Event::from_inbound(raw), Err(Rejection::MissingEntity));
    }

    #[test]
    fn unknown_type_falls_back_to_chat() {
        let raw = inbound(json!({"entity_id": "e1", "message": "hey", "message_type": "whisper"}));
        let event = Event::from_inbound(raw).unwrap();
        assert_eq!(event.message_type, MessageType::ChatMessage);
        assert_eq!(event.kind, EventKind::ChatMessage);
        assert_eq!(event.raw_type, "whisper");
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let raw = inbound(json!({"entity_id": 123456789012345678u64, "user_id": 42, "message": "hi"}));
        let event = Event::from_inbound(raw).unwrap();
        assert_eq!(event.entity_id, "123456789012345678");
        assert_eq!(event.user_id, "42");
    }

    #[test]
    fn slash_options_accept_list_and_map() {
        let raw = inbound(json!({
            "entity_id": "disc-1",
            "message": "/so",
            "message_type": "slashCommand",
            "metadata": {"options": [{"name": "user", "value": "bob"}, {"name": "count", "value": 3}]}
        }));
        let event = Event::from_inbound(raw).unwrap();
        let EventKind::SlashCommand { options } = &event.kind else {
            panic!("expected slash command, got {:?}", event.kind);
        };
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].value_text(), "3");
        assert!(event.metadata.options.is_empty());

        let raw = inbound(json!({
            "entity_id": "disc-1",
            "message": "/so",
            "message_type": "slashCommand",
            "metadata": {"options": {"user": "bob"}}
        }));
        let event = Event::from_inbound(raw).unwrap();
        assert!(matches!(&event.kind, EventKind::SlashCommand { options } if options[0].name == "user"));
    }

    #[test]
    fn interaction_reads_custom_id_from_metadata() {
        let raw = inbound(json!({
            "entity_id": "disc-1",
            "message_type": "button_click",
            "metadata": {"custom_id": "poll:vote:42", "guild_locale": "en-US"}
        }));
        let event = Event::from_inbound(raw).unwrap();
        assert_eq!(
            event.kind,
            EventKind::Interaction { custom_id: "poll:vote:42".into() }
        );
        assert_eq!(event.metadata.extra.get("guild_locale"), Some(&json!("en-US")));
    }

    #[test]
    fn translation_keeps_original_message() {
        let raw = inbound(json!({"entity_id": "e1", "message": "hola mundo"}));
        let mut event = Event::from_inbound(raw).unwrap();
        event.apply_translation(TranslationResult {
            translated_text: "hello world".into(),
            detected_lang: "es".into(),
            target_lang: "en".into(),
            confidence: 0.97,
            provider: "google".into(),
            cached: false,
        });
        assert_eq!(event.message, "hello world");
        assert_eq!(event.metadata.original_message.as_deref(), Some("hola mundo"));
        assert_eq!(event.metadata.translation.as_ref().unwrap().detected_lang, "es");
    }

    #[test]
    fn mistyped_metadata_is_kept_in_extra() {
        let raw = inbound(json!({
            "entity_id": "twitch-1",
            "message_type": "cheer",
            "metadata": {
                "tier": 1000,
                "amount": "500",
                "viewers": -1,
                "custom_id": 12345,
                "translation": "es",
                "options": "user=bob",
                "original_message": null,
            }
        }));
        let meta = raw.metadata;
        assert_eq!(meta.tier.as_deref(), Some("1000"));
        assert_eq!(meta.amount, Some(500));
        assert_eq!(meta.custom_id.as_deref(), Some("12345"));
        assert_eq!(meta.viewers, None);
        assert_eq!(meta.extra.get("viewers"), Some(&json!(-1)));
        assert!(meta.translation.is_none());
        assert_eq!(meta.extra.get("translation"), Some(&json!("es")));
        assert!(meta.options.is_empty());
        assert_eq!(meta.extra.get("options"), Some(&json!("user=bob")));
        assert!(!meta.extra.contains_key("original_message"));
    }

    #[test]
    fn non_object_metadata_is_empty() {
        let raw = inbound(json!({"entity_id": "e1", "metadata": "oops"}));
        assert_eq!(raw.metadata, Metadata::default());
        let raw = inbound(json!({"entity_id": "e1", "metadata": null}));
        assert_eq!(raw.metadata, Metadata::default());
    }

    #[test]
    fn reputation_applies_to_engagement_events_only() {
        assert_eq!(MessageType::Cheer.reputation_event(), Some("cheer"));
        assert_eq!(MessageType::StreamOnline.reputation_event(), None);
        assert!(MessageType::GiftSubscription.is_stream_event());
        assert!(!MessageType::ChatMessage.is_stream_event());
    }
}

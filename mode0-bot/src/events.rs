//! Event types that flow through the pipeline.
//!
//! Listeners produce [`RawEvent`]s in whatever shape their platform gives
//! them. The normalizer turns those into immutable [`NormalizedEvent`]s, the
//! only type the queue, the decision engine and the dispatcher deal with.
//! Replies leave the pipeline as [`OutboundMessage`]s.

use crate::util::timestamp_ms;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a normalized event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A chat line from a viewer.
    ChatMessage,
    /// New follower.
    Follow,
    /// New or renewed subscription.
    Subscription,
    /// Tip or donation.
    Tip,
    /// Incoming raid (or host).
    Raid,
    /// Channel-point / loyalty redemption.
    Redemption,
    /// Synthetic event minted by the idle-chat scheduler.
    Idle,
}

impl EventKind {
    /// Parse an inbound kind tag.
    ///
    /// Accepts the internal snake-case names and the StreamElements
    /// `*-latest` tags. `idle` is rejected: idle events are
    /// only ever minted inside the process.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "chat_message" | "chat" | "message" => Some(Self::ChatMessage),
            "follow" | "follower" | "follower-latest" => Some(Self::Follow),
            "subscription" | "subscriber" | "subscriber-latest" => Some(Self::Subscription),
            "tip" | "tip-latest" => Some(Self::Tip),
            "raid" | "raid-latest" | "host" | "host-latest" => Some(Self::Raid),
            "redemption" | "redemption-latest" => Some(Self::Redemption),
            _ => None,
        }
    }

    /// Whether this is a social platform event (always acknowledged).
    #[must_use]
    pub const fn is_social(self) -> bool {
        matches!(
            self,
            Self::Follow | Self::Subscription | Self::Tip | Self::Raid | Self::Redemption
        )
    }

    /// Stable snake-case name, used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChatMessage => "chat_message",
            Self::Follow => "follow",
            Self::Subscription => "subscription",
            Self::Tip => "tip",
            Self::Raid => "raid",
            Self::Redemption => "redemption",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound event as produced by a listener, before validation.
///
/// Every field is optional because listeners cannot be trusted to fill them;
/// the normalizer decides what is required. Platform payloads deserialize
/// straight into this type (`type` is accepted as an alias of `kind`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    /// Kind tag (`chat_message`, `follower-latest`, ...).
    #[serde(alias = "type")]
    pub kind: Option<String>,
    /// Channel the event belongs to.
    pub channel: Option<String>,
    /// Platform user id of the actor.
    pub user_id: Option<String>,
    /// Login name of the actor.
    pub username: Option<String>,
    /// Display name of the actor.
    pub display_name: Option<String>,
    /// Free text (chat line, tip message, redemption input).
    pub content: Option<String>,
    /// Platform timestamp in Unix milliseconds.
    pub timestamp: Option<u64>,
    /// Event-specific payload (amount, tier, viewers, reward title...).
    pub data: serde_json::Value,
}

impl RawEvent {
    /// A chat message as pushed by the chat connection.
    pub fn chat(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            kind: Some(EventKind::ChatMessage.as_str().to_string()),
            channel: Some(channel.into()),
            user_id: Some(user_id.into()),
            username: Some(display_name.to_lowercase()),
            display_name: Some(display_name),
            content: Some(content.into()),
            timestamp: Some(timestamp_ms()),
            data: serde_json::Value::Null,
        }
    }

    /// A platform event as pushed by the event-source client.
    pub fn platform(
        kind: impl Into<String>,
        channel: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            kind: Some(kind.into()),
            channel: Some(channel.into()),
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Set the actor's user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the free-text content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the event-specific payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// A validated, immutable pipeline event.
///
/// Fields are private; use the accessors. Only the normalizer (for external
/// events) and [`NormalizedEvent::idle`] (for the scheduler) can build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    id: u64,
    kind: EventKind,
    user_id: Option<String>,
    username: Option<String>,
    display_name: Option<String>,
    channel: String,
    content: Option<String>,
    received_at: u64,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl NormalizedEvent {
    #[allow(clippy::too_many_arguments)]
    pub(crate) const fn new(
        id: u64,
        kind: EventKind,
        user_id: Option<String>,
        username: Option<String>,
        display_name: Option<String>,
        channel: String,
        content: Option<String>,
        received_at: u64,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id,
            kind,
            user_id,
            username,
            display_name,
            channel,
            content,
            received_at,
            metadata,
        }
    }

    /// A synthetic idle event for `channel`.
    pub(crate) fn idle(id: u64, channel: impl Into<String>) -> Self {
        Self::new(
            id,
            EventKind::Idle,
            None,
            None,
            None,
            channel.into(),
            None,
            timestamp_ms(),
            serde_json::Value::Null,
        )
    }

    /// Unique, monotonically increasing event id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Actor's user id; `None` only for idle events.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Actor's login name, if known.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Actor's display name, falling back to the login name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.username.as_deref())
    }

    /// Channel the event belongs to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Free-text content, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Receive time in Unix milliseconds.
    #[must_use]
    pub const fn received_at(&self) -> u64 {
        self.received_at
    }

    /// Event-specific payload.
    #[must_use]
    pub const fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    /// Human-readable amount from the payload (tips, bits, raid viewers).
    #[must_use]
    pub fn amount(&self) -> Option<String> {
        ["amount", "viewers", "months", "count"]
            .iter()
            .find_map(|key| match self.metadata.get(key)? {
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
    }
}

/// A reply from the bot to a chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target channel.
    pub channel: String,
    /// Message text.
    pub content: String,
    /// Id of the event this replies to.
    pub in_reply_to: u64,
}

impl OutboundMessage {
    /// Create a reply to `event`.
    pub fn reply_to(event: &NormalizedEvent, content: impl Into<String>) -> Self {
        Self {
            channel: event.channel().to_string(),
            content: content.into(),
            in_reply_to: event.id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(EventKind::from_tag("follower-latest"), Some(EventKind::Follow));
        assert_eq!(EventKind::from_tag("Subscription"), Some(EventKind::Subscription));
        assert_eq!(EventKind::from_tag("host-latest"), Some(EventKind::Raid));
        assert_eq!(EventKind::from_tag("chat_message"), Some(EventKind::ChatMessage));
        assert_eq!(EventKind::from_tag("idle"), None);
        assert_eq!(EventKind::from_tag("cheer-latest"), None);
    }

    #[test]
    fn test_raw_event_accepts_streamelements_shape() {
        let raw: RawEvent = serde_json::from_str(
            r#"{"type":"tip-latest","channel":"qwazi905","username":"fan","data":{"amount":5}}"#,
        )
        .unwrap();
        assert_eq!(raw.kind.as_deref(), Some("tip-latest"));
        assert_eq!(raw.username.as_deref(), Some("fan"));
        assert_eq!(raw.data["amount"], 5);
    }

    #[test]
    fn test_amount_lookup() {
        let event = NormalizedEvent::new(
            1,
            EventKind::Tip,
            Some("u1".into()),
            Some("fan".into()),
            None,
            "c".into(),
            None,
            0,
            serde_json::json!({ "amount": 4.5 }),
        );
        assert_eq!(event.amount().as_deref(), Some("4.5"));
        assert_eq!(event.display_name(), Some("fan"));
    }

    #[test]
    fn test_reply_targets_event_channel() {
        let event = NormalizedEvent::idle(9, "qwazi905");
        let reply = OutboundMessage::reply_to(&event, "anyone around?");
        assert_eq!(reply.channel, "qwazi905");
        assert_eq!(reply.in_reply_to, 9);
        assert!(event.user_id().is_none());
    }
}

//! Response decisions.
//!
//! [`DecisionEngine::decide`] maps an event plus the user's current state to
//! a [`DecisionResult`]. It performs no I/O and draws every random number from
//! the generator it is handed, so the same inputs and seed always produce the
//! same decision.

mod commands;
mod engine;
mod heuristics;

pub use commands::{CommandHandler, CommandRegistry, PrefixCommand};
pub use engine::{DecisionEngine, DecisionSettings};
pub use heuristics::{MentionMatcher, TopicMatcher, is_question};

use crate::events::EventKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What the dispatcher should do with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Send one message after the decision delay.
    Respond,
    /// Do nothing.
    Ignore,
    /// Look at the event again later (at most once).
    Defer,
}

/// Which kind of text to compose for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    /// Greet a first-time or returning chatter.
    Greeting,
    /// General reply (also used when the bot is mentioned).
    Generic,
    /// Reply to a question.
    Question,
    /// Start a conversation in a quiet chat.
    ConversationStarter,
    /// Thank a new follower.
    FollowThanks,
    /// Thank a subscriber.
    SubscriptionThanks,
    /// Thank a tipper.
    TipThanks,
    /// Welcome a raid.
    RaidWelcome,
    /// Acknowledge a channel-point redemption.
    RedemptionAck,
    /// Reply to a chat command.
    Command,
}

impl ResponseCategory {
    /// Acknowledgement category for a social event kind.
    #[must_use]
    pub const fn for_social(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Follow => Some(Self::FollowThanks),
            EventKind::Subscription => Some(Self::SubscriptionThanks),
            EventKind::Tip => Some(Self::TipThanks),
            EventKind::Raid => Some(Self::RaidWelcome),
            EventKind::Redemption => Some(Self::RedemptionAck),
            EventKind::ChatMessage | EventKind::Idle => None,
        }
    }

    /// Stable snake-case name, used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Generic => "generic",
            Self::Question => "question",
            Self::ConversationStarter => "conversation_starter",
            Self::FollowThanks => "follow_thanks",
            Self::SubscriptionThanks => "subscription_thanks",
            Self::TipThanks => "tip_thanks",
            Self::RaidWelcome => "raid_welcome",
            Self::RedemptionAck => "redemption_ack",
            Self::Command => "command",
        }
    }
}

impl fmt::Display for ResponseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a decision. `category` is set exactly when `action` is
/// [`Action::Respond`]; `delay` is zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    /// What to do.
    pub action: Action,
    /// What to say, when responding.
    pub category: Option<ResponseCategory>,
    /// How long to wait before responding.
    pub delay: Duration,
}

impl DecisionResult {
    /// Respond with `category` after `delay`.
    #[must_use]
    pub const fn respond(category: ResponseCategory, delay: Duration) -> Self {
        Self {
            action: Action::Respond,
            category: Some(category),
            delay,
        }
    }

    /// Do nothing.
    #[must_use]
    pub const fn ignore() -> Self {
        Self {
            action: Action::Ignore,
            category: None,
            delay: Duration::ZERO,
        }
    }

    /// Revisit the event later.
    #[must_use]
    pub const fn defer() -> Self {
        Self {
            action: Action::Defer,
            category: None,
            delay: Duration::ZERO,
        }
    }

    /// Whether this decision sends a message.
    #[must_use]
    pub const fn is_respond(&self) -> bool {
        matches!(self.action, Action::Respond)
    }
}

impl fmt::Display for DecisionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.action, self.category) {
            (Action::Respond, Some(category)) => {
                write!(f, "respond/{category} after {:.1}s", self.delay.as_secs_f64())
            }
            (Action::Respond, None) => f.write_str("respond"),
            (Action::Ignore, _) => f.write_str("ignore"),
            (Action::Defer, _) => f.write_str("defer"),
        }
    }
}

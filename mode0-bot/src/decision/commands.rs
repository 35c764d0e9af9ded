//! Chat command handlers.
//!
//! Handlers are consulted in registration order before the probabilistic
//! rules; the first one whose [`CommandHandler::matches`] returns `true`
//! decides the event.

use super::{DecisionResult, ResponseCategory};
use crate::events::{EventKind, NormalizedEvent};
use crate::state::UserState;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A unit that can claim and decide chat events.
pub trait CommandHandler: Send + Sync {
    /// Handler name, used in logs.
    fn name(&self) -> &str;

    /// Whether this handler wants `event`.
    fn matches(&self, event: &NormalizedEvent) -> bool;

    /// Decide a matched event.
    fn handle(&self, event: &NormalizedEvent, state: &UserState) -> DecisionResult;
}

/// Split `content` into a lowercase command name and its arguments if it
/// starts with `prefix`.
#[must_use]
pub fn parse_command<'a>(prefix: &str, content: &'a str) -> Option<(String, &'a str)> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.trim()))
}

/// Built-in `!name` commands with fixed replies (`!help`, `!about`,
/// `!socials` by default).
#[derive(Debug, Clone)]
pub struct PrefixCommand {
    prefix: String,
    replies: BTreeMap<String, String>,
}

impl PrefixCommand {
    /// Create a handler answering every name in `replies`.
    pub fn new(prefix: impl Into<String>, replies: BTreeMap<String, String>) -> Self {
        Self {
            prefix: prefix.into(),
            replies: replies
                .into_iter()
                .map(|(name, reply)| (name.to_lowercase(), reply))
                .collect(),
        }
    }

    /// Reply template for the command in `content`, if it is one of ours.
    #[must_use]
    pub fn reply_for(&self, content: &str) -> Option<&str> {
        let (name, _) = parse_command(&self.prefix, content)?;
        self.replies.get(&name).map(String::as_str)
    }
}

impl CommandHandler for PrefixCommand {
    fn name(&self) -> &str {
        "prefix"
    }

    fn matches(&self, event: &NormalizedEvent) -> bool {
        event.kind() == EventKind::ChatMessage
            && event.content().is_some_and(|c| self.reply_for(c).is_some())
    }

    fn handle(&self, _event: &NormalizedEvent, _state: &UserState) -> DecisionResult {
        DecisionResult::respond(ResponseCategory::Command, Duration::ZERO)
    }
}

/// Ordered list of command handlers.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: Vec<Arc<dyn CommandHandler>>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

impl CommandRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; earlier handlers take precedence.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.push(handler);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Result of the first matching handler, with its name.
    pub fn dispatch(&self, event: &NormalizedEvent, state: &UserState) -> Option<(&str, DecisionResult)> {
        self.handlers
            .iter()
            .find(|h| h.matches(event))
            .map(|h| (h.name(), h.handle(event, state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RawEvent;
    use crate::normalizer::EventNormalizer;

    fn chat(content: &str) -> NormalizedEvent {
        EventNormalizer::new()
            .normalize(RawEvent::chat("c", "1", "alice", content))
            .unwrap()
    }

    fn builtins() -> PrefixCommand {
        PrefixCommand::new(
            "!",
            BTreeMap::from([
                ("help".to_string(), "help text".to_string()),
                ("Socials".to_string(), "links".to_string()),
            ]),
        )
    }

    struct Shout;

    impl CommandHandler for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn matches(&self, event: &NormalizedEvent) -> bool {
            event.content().is_some_and(|c| c.starts_with("!help"))
        }

        fn handle(&self, _event: &NormalizedEvent, _state: &UserState) -> DecisionResult {
            DecisionResult::ignore()
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("!", "!help"), Some(("help".to_string(), "")));
        assert_eq!(parse_command("!", "  !SO  @dj now "), Some(("so".to_string(), "@dj now")));
        assert_eq!(parse_command("!", "! help"), None);
        assert_eq!(parse_command("!", "help"), None);
    }

    #[test]
    fn test_prefix_command_matches_known_names_only() {
        let handler = builtins();
        assert!(handler.matches(&chat("!help")));
        assert!(handler.matches(&chat("!socials please")));
        assert!(!handler.matches(&chat("!botmode chill")));
        assert!(!handler.matches(&chat("help")));
        assert_eq!(handler.reply_for("!SOCIALS"), Some("links"));
    }

    #[test]
    fn test_registry_first_match_wins() {
        let registry = CommandRegistry::new()
            .with(Arc::new(Shout))
            .with(Arc::new(builtins()));
        let state = UserState::new("1");

        let (name, result) = registry.dispatch(&chat("!help"), &state).unwrap();
        assert_eq!(name, "shout");
        assert_eq!(result, DecisionResult::ignore());

        let (name, result) = registry.dispatch(&chat("!socials"), &state).unwrap();
        assert_eq!(name, "prefix");
        assert_eq!(result.category, Some(ResponseCategory::Command));

        assert!(registry.dispatch(&chat("hello"), &state).is_none());
        assert_eq!(registry.len(), 2);
    }
}

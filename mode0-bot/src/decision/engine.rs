//! The decision rules.

use super::commands::{CommandRegistry, PrefixCommand};
use super::heuristics::{MentionMatcher, TopicMatcher, is_question};
use super::{Action, DecisionResult, ResponseCategory};
use crate::config::{BotConfig, Rate};
use crate::events::{EventKind, NormalizedEvent};
use crate::state::UserState;
use fastrand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for [`DecisionEngine`], usually taken from [`BotConfig`].
#[derive(Debug, Clone)]
pub struct DecisionSettings {
    /// Names that count as mentioning the bot.
    pub bot_names: Vec<String>,
    /// Mention rule probability.
    pub mention_rate: Rate,
    /// Question rule probability.
    pub question_rate: Rate,
    /// General chat probability.
    pub general_rate: Rate,
    /// Idle conversation starter probability.
    pub idle_rate: Rate,
    /// Greeting probability.
    pub greeting_rate: Rate,
    /// Absence after which a chatter is greeted again.
    pub greeting_absence: Duration,
    /// Topics that raise the general chat probability.
    pub boost_topics: Vec<String>,
    /// How much a boost topic raises the general chat probability.
    pub topic_boost: Rate,
    /// Shortest response delay.
    pub min_delay: Duration,
    /// Longest response delay.
    pub max_delay: Duration,
    /// Chat replies to a user answered more recently than this are deferred.
    pub user_cooldown: Duration,
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self::from(&BotConfig::default())
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl From<&BotConfig> for DecisionSettings {
    fn from(config: &BotConfig) -> Self {
        let mut bot_names = vec![config.bot.name.clone()];
        if !config.twitch.nick.eq_ignore_ascii_case(&config.bot.name) {
            bot_names.push(config.twitch.nick.clone());
        }
        let engagement = &config.engagement;
        let timing = config.response_timing;

        Self {
            bot_names,
            mention_rate: engagement.mention_response_rate,
            question_rate: engagement.direct_question_rate,
            general_rate: engagement.general_chat_rate,
            idle_rate: engagement.idle_chat_rate,
            greeting_rate: engagement.greeting_rate,
            greeting_absence: Duration::from_secs(engagement.greeting_absence_secs),
            boost_topics: config.persona.topics.engagement_boost.clone(),
            topic_boost: engagement.topic_boost,
            min_delay: seconds(timing.min_delay),
            max_delay: seconds(timing.max_delay),
            user_cooldown: seconds(timing.user_cooldown),
        }
    }
}

/// Pure decision function over (event, state, generator).
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    settings: DecisionSettings,
    mentions: MentionMatcher,
    boost_topics: TopicMatcher,
    commands: CommandRegistry,
}

impl DecisionEngine {
    /// Create an engine with no command handlers.
    #[must_use]
    pub fn new(settings: DecisionSettings) -> Self {
        Self {
            mentions: MentionMatcher::new(&settings.bot_names),
            boost_topics: TopicMatcher::new(&settings.boost_topics),
            settings,
            commands: CommandRegistry::new(),
        }
    }

    /// Engine configured from `config`, with the built-in prefix commands
    /// registered.
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        let builtins = PrefixCommand::new(config.bot.command_prefix.clone(), config.commands.clone());
        Self::new(DecisionSettings::from(config)).with_commands(CommandRegistry::new().with(Arc::new(builtins)))
    }

    /// Replace the command registry.
    #[must_use]
    pub fn with_commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = commands;
        self
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &DecisionSettings {
        &self.settings
    }

    /// Decide what to do with `event` given the user's state before the event.
    ///
    /// Rules, first match wins:
    ///
    /// 1. chat commands (registered handlers, in order);
    /// 2. idle events: conversation starter with `idle_rate`;
    /// 3. social events: always acknowledged;
    /// 4. the bot is mentioned: generic reply with `mention_rate`;
    /// 5. a question: question reply with `question_rate`;
    /// 6. a first-time or returning chatter: greeting with `greeting_rate`,
    ///    falling through to rule 7 when the draw fails;
    /// 7. anything else: generic reply with `general_rate`, boosted when the
    ///    message hits an engagement topic.
    ///
    /// A chat reply to a user answered within `user_cooldown` is deferred.
    /// Time-dependent rules are evaluated at the event's receive time.
    pub fn decide(&self, event: &NormalizedEvent, state: &UserState, rng: &mut Rng) -> DecisionResult {
        self.decide_at(event, state, event.received_at(), rng)
    }

    /// [`decide`](Self::decide) with the time-dependent rules (greeting
    /// absence, per-user cooldown) evaluated at `now_ms`.
    pub fn decide_at(
        &self,
        event: &NormalizedEvent,
        state: &UserState,
        now_ms: u64,
        rng: &mut Rng,
    ) -> DecisionResult {
        let kind = event.kind();

        if kind == EventKind::ChatMessage
            && let Some((_, result)) = self.commands.dispatch(event, state)
        {
            return match result.action {
                Action::Respond => DecisionResult {
                    delay: self.draw_delay(rng),
                    ..result
                },
                Action::Ignore | Action::Defer => result,
            };
        }

        if kind == EventKind::Idle {
            return self.gate(self.settings.idle_rate, ResponseCategory::ConversationStarter, rng);
        }

        if let Some(category) = ResponseCategory::for_social(kind) {
            return DecisionResult::respond(category, self.draw_delay(rng));
        }

        let content = event.content().unwrap_or_default();
        let result = if self.mentions.is_match(content) {
            self.gate(self.settings.mention_rate, ResponseCategory::Generic, rng)
        } else if is_question(content) {
            self.gate(self.settings.question_rate, ResponseCategory::Question, rng)
        } else if self.is_greeting_due(state, now_ms)
            && chance(self.settings.greeting_rate, rng)
        {
            DecisionResult::respond(ResponseCategory::Greeting, self.draw_delay(rng))
        } else {
            let rate = if self.boost_topics.any(content) {
                self.settings.general_rate.boosted(self.settings.topic_boost)
            } else {
                self.settings.general_rate
            };
            self.gate(rate, ResponseCategory::Generic, rng)
        };

        if result.is_respond() && self.in_user_cooldown(state, now_ms) {
            return DecisionResult::defer();
        }
        result
    }

    fn gate(&self, rate: Rate, category: ResponseCategory, rng: &mut Rng) -> DecisionResult {
        if chance(rate, rng) {
            DecisionResult::respond(category, self.draw_delay(rng))
        } else {
            DecisionResult::ignore()
        }
    }

    fn draw_delay(&self, rng: &mut Rng) -> Duration {
        let min = self.settings.min_delay;
        let span = self.settings.max_delay.saturating_sub(min);
        min + span.mul_f64(rng.f64())
    }

    fn is_greeting_due(&self, state: &UserState, now_ms: u64) -> bool {
        if state.message_count == 0 {
            return true;
        }
        state
            .since_last_seen(now_ms)
            .is_some_and(|ms| Duration::from_millis(ms) >= self.settings.greeting_absence)
    }

    fn in_user_cooldown(&self, state: &UserState, now_ms: u64) -> bool {
        state.last_response_at.is_some_and(|at| {
            Duration::from_millis(now_ms.saturating_sub(at)) < self.settings.user_cooldown
        })
    }
}

/// One Bernoulli draw. Always consumes exactly one value, whatever the rate.
fn chance(rate: Rate, rng: &mut Rng) -> bool {
    rng.f64() < rate.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RawEvent;
    use crate::normalizer::EventNormalizer;
    use serde_json::json;

    fn settings() -> DecisionSettings {
        DecisionSettings {
            bot_names: vec!["Mode_0".into()],
            mention_rate: Rate::ALWAYS,
            question_rate: Rate::ALWAYS,
            general_rate: Rate::NEVER,
            idle_rate: Rate::ALWAYS,
            greeting_rate: Rate::NEVER,
            greeting_absence: Duration::from_secs(1800),
            boost_topics: vec!["hard house".into()],
            topic_boost: Rate::NEVER,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            user_cooldown: Duration::ZERO,
        }
    }

    fn chat(content: &str) -> NormalizedEvent {
        EventNormalizer::new()
            .normalize(RawEvent::chat("c", "u1", "alice", content))
            .unwrap()
    }

    fn regular() -> UserState {
        let mut state = UserState::new("u1");
        state.message_count = 5;
        state.last_seen = crate::util::timestamp_ms();
        state
    }

    #[test]
    fn test_question_rule() {
        let mut s = settings();
        s.mention_rate = Rate::NEVER;
        let engine = DecisionEngine::new(s);
        let result = engine.decide(&chat("are you there?"), &regular(), &mut Rng::with_seed(7));
        assert_eq!(result.action, Action::Respond);
        assert_eq!(result.category, Some(ResponseCategory::Question));
        assert!(result.delay >= Duration::from_secs(1) && result.delay <= Duration::from_secs(3));
    }

    #[test]
    fn test_decisions_are_reproducible() {
        let mut s = settings();
        s.question_rate = Rate::new(0.5).unwrap();
        s.general_rate = Rate::new(0.5).unwrap();
        s.greeting_rate = Rate::new(0.5).unwrap();
        let engine = DecisionEngine::new(s);
        let messages = ["hi all", "what is this track?", "mode_0 hello", "nice", "hard house!"];

        for seed in 0..20 {
            for msg in messages {
                let event = chat(msg);
                let state = UserState::new("u1");
                let a = engine.decide(&event, &state, &mut Rng::with_seed(seed));
                let b = engine.decide(&event, &state, &mut Rng::with_seed(seed));
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_mention_beats_question_and_gate_failure_ignores() {
        let mut s = settings();
        s.mention_rate = Rate::NEVER;
        let engine = DecisionEngine::new(s);
        let result = engine.decide(&chat("@mode_0 are you there?"), &regular(), &mut Rng::with_seed(1));
        assert_eq!(result, DecisionResult::ignore());

        let engine = DecisionEngine::new(settings());
        let result = engine.decide(&chat("@mode_0 are you there?"), &regular(), &mut Rng::with_seed(1));
        assert_eq!(result.category, Some(ResponseCategory::Generic));
    }

    #[test]
    fn test_social_events_always_respond() {
        let mut s = settings();
        s.mention_rate = Rate::NEVER;
        s.question_rate = Rate::NEVER;
        let engine = DecisionEngine::new(s);
        let normalizer = EventNormalizer::new();

        for (tag, category) in [
            ("follower-latest", ResponseCategory::FollowThanks),
            ("subscriber-latest", ResponseCategory::SubscriptionThanks),
            ("tip-latest", ResponseCategory::TipThanks),
            ("raid-latest", ResponseCategory::RaidWelcome),
            ("redemption-latest", ResponseCategory::RedemptionAck),
        ] {
            let event = normalizer
                .normalize(RawEvent::platform(tag, "c", "fan").with_data(json!({"amount": 3})))
                .unwrap();
            let result = engine.decide(&event, &UserState::new("fan"), &mut Rng::with_seed(3));
            assert_eq!(result.action, Action::Respond);
            assert_eq!(result.category, Some(category));
        }
    }

    #[test]
    fn test_idle_rule() {
        let normalizer = EventNormalizer::new();
        let idle = normalizer.idle("c");

        let engine = DecisionEngine::new(settings());
        let result = engine.decide(&idle, &UserState::new("idle"), &mut Rng::with_seed(5));
        assert_eq!(result.category, Some(ResponseCategory::ConversationStarter));

        let mut s = settings();
        s.idle_rate = Rate::NEVER;
        let engine = DecisionEngine::new(s);
        let result = engine.decide(&idle, &UserState::new("idle"), &mut Rng::with_seed(5));
        assert_eq!(result, DecisionResult::ignore());
    }

    #[test]
    fn test_greeting_for_new_and_returning_users() {
        let mut s = settings();
        s.greeting_rate = Rate::ALWAYS;
        let engine = DecisionEngine::new(s);
        let event = chat("hello everyone");

        let result = engine.decide(&event, &UserState::new("u1"), &mut Rng::with_seed(9));
        assert_eq!(result.category, Some(ResponseCategory::Greeting));

        let mut returning = regular();
        returning.last_seen = event.received_at() - 2 * 3600 * 1000;
        let result = engine.decide(&event, &returning, &mut Rng::with_seed(9));
        assert_eq!(result.category, Some(ResponseCategory::Greeting));

        // Seen moments ago: no greeting, and general chat is disabled.
        let result = engine.decide(&event, &regular(), &mut Rng::with_seed(9));
        assert_eq!(result, DecisionResult::ignore());
    }

    #[test]
    fn test_topic_boost_raises_general_rate() {
        let mut s = settings();
        s.topic_boost = Rate::ALWAYS;
        let engine = DecisionEngine::new(s);

        let boosted = engine.decide(&chat("this hard house set"), &regular(), &mut Rng::with_seed(2));
        assert_eq!(boosted.category, Some(ResponseCategory::Generic));

        let plain = engine.decide(&chat("this techno set"), &regular(), &mut Rng::with_seed(2));
        assert_eq!(plain, DecisionResult::ignore());
    }

    #[test]
    fn test_commands_come_first() {
        let mut config = BotConfig::default();
        config.engagement.mention_response_rate = Rate::NEVER;
        let engine = DecisionEngine::from_config(&config);

        let result = engine.decide(&chat("!help mode_0"), &regular(), &mut Rng::with_seed(4));
        assert_eq!(result.category, Some(ResponseCategory::Command));
        assert!(result.delay >= Duration::from_secs(1));

        // Unknown commands fall through to the normal rules.
        let result = engine.decide(&chat("!botmode mode_0"), &regular(), &mut Rng::with_seed(4));
        assert_eq!(result, DecisionResult::ignore());
    }

    #[test]
    fn test_recent_reply_defers() {
        let mut s = settings();
        s.user_cooldown = Duration::from_secs(10);
        let engine = DecisionEngine::new(s);
        let event = chat("are you there?");

        let mut state = regular();
        state.last_response_at = Some(event.received_at() - 2_000);
        let result = engine.decide(&event, &state, &mut Rng::with_seed(1));
        assert_eq!(result, DecisionResult::defer());

        // Re-evaluated later, the same event is past the cooldown.
        let later = event.received_at() + 60_000;
        let result = engine.decide_at(&event, &state, later, &mut Rng::with_seed(1));
        assert!(result.is_respond());

        state.last_response_at = Some(event.received_at() - 60_000);
        let result = engine.decide(&event, &state, &mut Rng::with_seed(1));
        assert!(result.is_respond());
    }
}

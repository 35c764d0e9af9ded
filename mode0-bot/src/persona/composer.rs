//! Turns a decision into message text.

use super::templates::ResponseTemplates;
use crate::config::BotConfig;
use crate::decision::{MentionMatcher, PrefixCommand, ResponseCategory};
use crate::events::NormalizedEvent;
use crate::state::UserState;
use fastrand::Rng;

const HOUR_MS: u64 = 3_600_000;
const DAY_MS: u64 = 24 * HOUR_MS;
const WEEK_MS: u64 = 7 * DAY_MS;

/// Renders response text from the configured templates.
#[derive(Debug, Clone)]
pub struct ResponseComposer {
    templates: ResponseTemplates,
    commands: PrefixCommand,
    mentions: MentionMatcher,
}

impl ResponseComposer {
    /// Create a composer.
    #[must_use]
    pub fn new(templates: ResponseTemplates, commands: PrefixCommand, bot_names: &[String]) -> Self {
        Self {
            templates,
            commands,
            mentions: MentionMatcher::new(bot_names),
        }
    }

    /// Composer configured from `config`.
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        let names = [config.bot.name.clone(), config.twitch.nick.clone()];
        Self::new(
            config.responses.clone(),
            PrefixCommand::new(config.bot.command_prefix.clone(), config.commands.clone()),
            &names,
        )
    }

    /// Text for a `category` response to `event`.
    ///
    /// `state` is the user's state before the event. Returns `None` when
    /// there is nothing to say (empty template lists, unknown command).
    pub fn compose(
        &self,
        category: ResponseCategory,
        event: &NormalizedEvent,
        state: &UserState,
        rng: &mut Rng,
    ) -> Option<String> {
        let content = event.content().unwrap_or_default();
        let t = &self.templates;

        let template = match category {
            ResponseCategory::Command => {
                let reply = self.commands.reply_for(content)?;
                if reply.trim().is_empty() {
                    t.help_message.clone()
                } else {
                    reply.to_string()
                }
            }
            ResponseCategory::Greeting => {
                pick(self.greetings_for(state, event.received_at()), rng)
                    .or_else(|| pick(&t.greetings, rng))?
            }
            ResponseCategory::Generic if self.mentions.is_match(content) => {
                pick(&t.mention_responses, rng).or_else(|| pick(&t.generic_responses, rng))?
            }
            ResponseCategory::Generic => pick(&t.generic_responses, rng)?,
            ResponseCategory::Question => {
                pick(&t.question_responses, rng).or_else(|| pick(&t.generic_responses, rng))?
            }
            ResponseCategory::ConversationStarter => {
                let total = t.conversation_starters.len() + t.quiet_starters.len();
                if total == 0 {
                    return None;
                }
                let i = rng.usize(..total);
                t.conversation_starters
                    .iter()
                    .chain(&t.quiet_starters)
                    .nth(i)?
                    .clone()
            }
            ResponseCategory::FollowThanks => pick(&t.follow_thanks, rng)?,
            ResponseCategory::SubscriptionThanks => pick(&t.subscription_thanks, rng)?,
            ResponseCategory::TipThanks => pick(&t.tip_thanks, rng)?,
            ResponseCategory::RaidWelcome => pick(&t.raid_welcome, rng)?,
            ResponseCategory::RedemptionAck => pick(&t.redemption_ack, rng)?,
        };

        let name = event.display_name().unwrap_or_else(|| state.name());
        Some(render(&template, name, event.amount().as_deref()))
    }

    fn greetings_for(&self, state: &UserState, now_ms: u64) -> &[String] {
        let t = &self.templates;
        if state.message_count == 0 {
            return &t.first_time_greetings;
        }
        match state.since_last_seen(now_ms) {
            Some(ms) if ms < 2 * HOUR_MS => &t.quick_return_greetings,
            Some(ms) if ms < DAY_MS => &t.same_day_greetings,
            Some(ms) if ms < WEEK_MS => &t.week_greetings,
            Some(_) => &t.long_absence_greetings,
            None => &t.first_time_greetings,
        }
    }
}

fn pick(list: &[String], rng: &mut Rng) -> Option<String> {
    if list.is_empty() {
        None
    } else {
        Some(list[rng.usize(..list.len())].clone())
    }
}

fn render(template: &str, username: &str, amount: Option<&str>) -> String {
    template
        .replace("{username}", username)
        .replace("{amount}", amount.unwrap_or("some"))
}

//! Response template lists.

use serde::{Deserialize, Serialize};

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Every template list the composer draws from.
///
/// `{username}` is replaced by the addressed user's name and `{amount}` by
/// the event amount (tip value, raid size, sub months). Empty lists fall back
/// to `greetings` / `generic_responses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTemplates {
    /// Fallback greetings.
    pub greetings: Vec<String>,
    /// First message ever from this user.
    pub first_time_greetings: Vec<String>,
    /// Back within two hours.
    pub quick_return_greetings: Vec<String>,
    /// Back within a day.
    pub same_day_greetings: Vec<String>,
    /// Back within a week.
    pub week_greetings: Vec<String>,
    /// Back after more than a week.
    pub long_absence_greetings: Vec<String>,
    /// General chat replies.
    pub generic_responses: Vec<String>,
    /// Replies to questions.
    pub question_responses: Vec<String>,
    /// Replies when the bot is mentioned.
    pub mention_responses: Vec<String>,
    /// Idle conversation starters.
    pub conversation_starters: Vec<String>,
    /// Idle starters that call out the quiet chat.
    pub quiet_starters: Vec<String>,
    /// New follower.
    pub follow_thanks: Vec<String>,
    /// New or renewed subscription.
    pub subscription_thanks: Vec<String>,
    /// Tip or donation.
    pub tip_thanks: Vec<String>,
    /// Incoming raid or host.
    pub raid_welcome: Vec<String>,
    /// Channel-point redemption.
    pub redemption_ack: Vec<String>,
    /// Reply for the help command when `commands.help` is not set.
    pub help_message: String,
}

impl Default for ResponseTemplates {
    fn default() -> Self {
        Self {
            greetings: lines(&[
                "Hey there, {username}!",
                "What's up, {username}!",
                "Hello, {username}!",
                "Yo {username}! Welcome to the stream!",
            ]),
            first_time_greetings: lines(&[
                "Welcome, {username}! First time here? Great to meet you!",
                "Hey {username}! Nice to see a new face in the chat!",
                "What's up {username}! Welcome to DJ Qwazi905's stream!",
            ]),
            quick_return_greetings: lines(&[
                "Back so soon, {username}? Can't get enough, huh?",
                "There you are again, {username}! Missed us?",
                "Welcome back, {username}! That was quick!",
            ]),
            same_day_greetings: lines(&[
                "Welcome back, {username}! Glad you could join us again today!",
                "Hey {username}! Thanks for coming back!",
                "Look who's back for more! Hi {username}!",
            ]),
            week_greetings: lines(&[
                "Hey {username}! Good to see you this week!",
                "Welcome back, {username}! Been a few days!",
                "{username} has returned! How's your week been?",
            ]),
            long_absence_greetings: lines(&[
                "Whoa, {username} is back! It's been a while!",
                "Look who it is! {username} has returned!",
                "The legend returns! Welcome back, {username}!",
            ]),
            generic_responses: lines(&[
                "That's interesting, {username}!",
                "I hear you, {username}.",
                "Nice one, {username}!",
                "Totally agree with you, {username}!",
                "Thanks for sharing that, {username}!",
            ]),
            question_responses: lines(&[
                "Good question, {username}! Let me think...",
                "Hmm, that's a tough one, {username}.",
                "Let me see if I can help with that, {username}.",
                "That's a great question, {username}!",
            ]),
            mention_responses: lines(&[
                "You called, {username}?",
                "I'm here, {username}!",
                "What's up, {username}?",
                "How can I help, {username}?",
            ]),
            conversation_starters: lines(&[
                "Anyone excited for the weekend?",
                "What's everyone listening to lately?",
                "How's the chat doing today?",
                "If you could only listen to one music genre forever, what would it be?",
                "What's the best concert you've ever been to?",
                "Anyone catch any good streams lately?",
                "Hot take: pineapple DOES belong on pizza. Discuss.",
                "What's your favorite track that DJ Qwazi905 plays?",
            ]),
            quiet_starters: lines(&[
                "It's quiet in here... too quiet. Let's change that!",
                "Perfect time for a chat! What's on everyone's mind?",
                "While it's chill, what music should DJ Qwazi905 play next stream?",
                "Let's get some energy in here! How's everyone doing?",
            ]),
            follow_thanks: lines(&[
                "Thanks for the follow, {username}! Welcome to the crew!",
                "{username} just followed! Glad to have you here!",
            ]),
            subscription_thanks: lines(&[
                "{username} just subscribed! Thank you so much!",
                "Huge thanks for the sub, {username}!",
            ]),
            tip_thanks: lines(&[
                "Wow, thank you for the {amount} tip, {username}!",
                "{username} dropped a {amount} tip! You're amazing!",
            ]),
            raid_welcome: lines(&[
                "RAID! Welcome {username} and the {amount} raiders!",
                "{username} is raiding with {amount}! Make some noise, chat!",
            ]),
            redemption_ack: lines(&[
                "{username} redeemed a reward! Nice!",
                "Redemption incoming from {username}!",
            ]),
            help_message: "I'm Mode_0, DJ Qwazi905's chat bot! Try commands like !help, !about, !socials, or just chat with me!".to_string(),
        }
    }
}

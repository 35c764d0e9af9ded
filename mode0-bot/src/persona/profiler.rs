//! Lightweight profile inference from chat messages.

use crate::config::PersonaConfig;
use crate::decision::TopicMatcher;
use crate::state::UserState;

const POSITIVE: &[&str] = &[
    "love", "loving", "great", "awesome", "amazing", "nice", "good", "fire", "banger", "hype",
    "lol", "thanks", "thank", "cool", "best", "fun", "pog", "poggers", "happy", "yes", "vibes",
];

const NEGATIVE: &[&str] = &[
    "hate", "bad", "boring", "awful", "terrible", "worst", "sad", "trash", "ugh", "annoying",
    "meh", "sucks", "tired", "angry",
];

/// What a single message says about its author.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageInsights {
    /// Configured topics mentioned in the message.
    pub interests: Vec<String>,
    /// Lexical sentiment in `[-1, 1]`; 0 when no sentiment word was found.
    pub sentiment: f64,
}

impl MessageInsights {
    /// Whether the message carried anything worth recording.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interests.is_empty() && self.sentiment == 0.0
    }
}

/// Extracts interests and mood from chat.
#[derive(Debug, Clone)]
pub struct ProfileAnalyzer {
    topics: TopicMatcher,
    learning_rate: f64,
}

impl ProfileAnalyzer {
    /// Analyzer over the preferred and engagement-boost topics.
    #[must_use]
    pub fn new(config: &PersonaConfig) -> Self {
        let mut topics = config.topics.preferred.clone();
        for topic in &config.topics.engagement_boost {
            if !topics.iter().any(|t| t.eq_ignore_ascii_case(topic)) {
                topics.push(topic.clone());
            }
        }
        Self {
            topics: TopicMatcher::new(&topics),
            learning_rate: config.learning_rate.clamp(0.0, 1.0),
        }
    }

    /// Analyze one message.
    #[must_use]
    pub fn analyze(&self, content: &str) -> MessageInsights {
        let (mut positive, mut negative) = (0_u32, 0_u32);
        for word in content
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if POSITIVE.contains(&word.as_str()) {
                positive += 1;
            } else if NEGATIVE.contains(&word.as_str()) {
                negative += 1;
            }
        }

        let total = positive + negative;
        let sentiment = if total == 0 {
            0.0
        } else {
            (f64::from(positive) - f64::from(negative)) / f64::from(total)
        };

        MessageInsights {
            interests: self.topics.find(content),
            sentiment,
        }
    }

    /// Merge `insights` into `state`.
    pub fn apply(&self, state: &mut UserState, insights: &MessageInsights) {
        state.add_interests(insights.interests.iter().cloned());
        if insights.sentiment != 0.0 {
            state.nudge_mood(insights.sentiment, self.learning_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> ProfileAnalyzer {
        ProfileAnalyzer::new(&PersonaConfig::default())
    }

    #[test]
    fn test_interests_from_topics() {
        let insights = analyzer().analyze("this Hard House set from the DJ is a banger");
        assert!(insights.interests.contains(&"hard house".to_string()));
        assert!(insights.interests.contains(&"dj".to_string()));
        assert!(insights.sentiment > 0.0);
    }

    #[test]
    fn test_sentiment_range() {
        let a = analyzer();
        assert!((a.analyze("love it, awesome").sentiment - 1.0).abs() < f64::EPSILON);
        assert!((a.analyze("ugh this is boring").sentiment + 1.0).abs() < f64::EPSILON);
        assert!(a.analyze("love it but kinda boring").sentiment.abs() < f64::EPSILON);
        assert!(a.analyze("ok").is_empty());
    }

    #[test]
    fn test_apply_moves_mood_by_learning_rate() {
        let a = analyzer();
        let mut state = UserState::new("1");
        a.apply(&mut state, &a.analyze("awesome music"));
        assert!((state.mood_bias - 0.05).abs() < 1e-9);
        assert!(state.interests.contains("music"));

        a.apply(&mut state, &a.analyze("nothing here"));
        assert!((state.mood_bias - 0.05).abs() < 1e-9);
    }
}

//! Cheap lexical checks used by the decision rules.

use regex::Regex;
use std::sync::OnceLock;

struct MessagePatterns {
    interrogative: Regex,
}

impl MessagePatterns {
    fn new() -> Self {
        Self {
            interrogative: Regex::new(
                r"(?i)^\s*(who|what|when|where|why|how|which|is|are|am|can|could|would|should|will|do|does|did|has|have|anyone|anybody)\b",
            )
            .expect("valid regex"),
        }
    }

    fn get() -> &'static Self {
        static PATTERNS: OnceLock<MessagePatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::new)
    }
}

/// Whether `content` reads as a question: it ends with `?` or opens with an
/// interrogative word.
#[must_use]
pub fn is_question(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.ends_with('?') || MessagePatterns::get().interrogative.is_match(trimmed)
}

/// Builds a case-insensitive alternation matching any of `words` on word
/// boundaries. Returns `None` when there is nothing to match.
fn word_alternation(prefix: &str, words: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    // Escaped literals always compile; a failure here would only be a size limit.
    Regex::new(&format!(r"(?i)(?:^|[^\w]){prefix}({})(?:$|[^\w])", alternatives.join("|"))).ok()
}

/// Detects the bot being addressed by name or `@handle`.
#[derive(Debug, Clone)]
pub struct MentionMatcher {
    pattern: Option<Regex>,
}

impl MentionMatcher {
    /// Match any of `names` (bot name, chat nick...), with or without `@`.
    #[must_use]
    pub fn new(names: &[String]) -> Self {
        Self {
            pattern: word_alternation("@?", names),
        }
    }

    /// Whether `content` mentions the bot.
    #[must_use]
    pub fn is_match(&self, content: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(content))
    }
}

/// Finds configured topics in a message.
#[derive(Debug, Clone)]
pub struct TopicMatcher {
    topics: Vec<(String, Regex)>,
}

impl TopicMatcher {
    /// Match each of `topics` as a whole word or phrase, case-insensitively.
    #[must_use]
    pub fn new(topics: &[String]) -> Self {
        let topics = topics
            .iter()
            .filter_map(|topic| {
                let normalized = topic.trim().to_lowercase();
                let pattern = word_alternation("", std::slice::from_ref(&normalized))?;
                Some((normalized, pattern))
            })
            .collect();
        Self { topics }
    }

    /// Topics (lowercased) found in `content`, in configuration order.
    #[must_use]
    pub fn find(&self, content: &str) -> Vec<String> {
        self.topics
            .iter()
            .filter(|(_, pattern)| pattern.is_match(content))
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// Whether any topic appears in `content`.
    #[must_use]
    pub fn any(&self, content: &str) -> bool {
        self.topics.iter().any(|(_, pattern)| pattern.is_match(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_is_question() {
        assert!(is_question("are you there?"));
        assert!(is_question("what time does the set start"));
        assert!(is_question("  Anyone else hear that  "));
        assert!(!is_question("this track slaps"));
        assert!(!is_question("whatever"));
        assert!(!is_question(""));
    }

    #[test]
    fn test_mentions() {
        let matcher = MentionMatcher::new(&names(&["Mode_0", "mode0bot"]));
        assert!(matcher.is_match("hey @mode_0 you up"));
        assert!(matcher.is_match("MODE_0 play something"));
        assert!(matcher.is_match("thanks mode0bot!"));
        assert!(!matcher.is_match("mode_01 is a different bot"));
        assert!(!matcher.is_match("nothing to see"));
        assert!(!MentionMatcher::new(&[]).is_match("mode_0"));
    }

    #[test]
    fn test_topics() {
        let matcher = TopicMatcher::new(&names(&["hard house", "DJ", "music"]));
        assert_eq!(matcher.find("love this Hard House set by the dj"), vec!["hard house", "dj"]);
        assert!(!matcher.any("djembe practice"));
        assert!(matcher.any("music!"));
    }
}

//! Bot configuration.
//!
//! Configuration lives in a single JSON document (default
//! `~/.mode0/config.json`). Every section and key has a documented default,
//! so a partial file (or no file at all) is valid. Values that would make the
//! pipeline misbehave, such as a probability outside `[0, 1]`, are rejected
//! here at load time and never reach the running bot.

use crate::error::{ConfigError, ConfigResult};
use crate::persona::ResponseTemplates;
use crate::util;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound for every configured duration (30 days).
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

// ============================================================================
// Rate
// ============================================================================

/// A probability in `[0, 1]`.
///
/// Construction is the only validation point: a `Rate` that exists is in
/// range, so decision code can use it without re-checking.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rate(f64);

impl Rate {
    /// Never fires.
    pub const NEVER: Self = Self(0.0);
    /// Always fires.
    pub const ALWAYS: Self = Self(1.0);

    /// Create a rate, rejecting values outside `[0, 1]` and NaN.
    pub fn new(value: f64) -> ConfigResult<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::invalid(format!(
                "rate {value} is outside [0, 1]"
            )))
        }
    }

    /// The raw probability.
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// This rate raised by `bonus`, capped at 1.0.
    #[must_use]
    pub fn boosted(self, bonus: Self) -> Self {
        Self((self.0 + bonus.0).min(1.0))
    }
}

impl TryFrom<f64> for Rate {
    type Error = ConfigError;

    fn try_from(value: f64) -> ConfigResult<Self> {
        Self::new(value)
    }
}

impl From<Rate> for f64 {
    fn from(rate: Rate) -> Self {
        rate.0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Twitch chat connection settings (consumed by the chat connection).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    /// OAuth token for the bot account.
    pub oauth_token: Option<String>,
    /// Channel to join.
    pub channel: String,
    /// Bot account login name, also treated as a mention handle.
    pub nick: String,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            oauth_token: None,
            channel: String::new(),
            nick: "mode_0".to_string(),
        }
    }
}

/// StreamElements event-source settings (consumed by the event-source client).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamElementsConfig {
    /// JWT used to authenticate the realtime socket.
    pub jwt: Option<String>,
    /// StreamElements channel id.
    pub channel_id: Option<String>,
}

/// General bot behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSection {
    /// Display name of the bot; mentions of it trigger the mention rule.
    pub name: String,
    /// Prefix for chat commands.
    pub command_prefix: String,
    /// Whether the idle-chat scheduler runs at all.
    pub auto_engage: bool,
    /// Seconds of chat silence before an idle event fires.
    pub engagement_interval: u64,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            name: "Mode_0".to_string(),
            command_prefix: "!".to_string(),
            auto_engage: true,
            engagement_interval: 600,
        }
    }
}

/// Which profile storage backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// SQLite database file.
    #[default]
    Sqlite,
    /// One JSON file per user in a directory.
    File,
    /// Process memory only; nothing survives a restart.
    Memory,
}

/// Profile storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Storage backend.
    pub backend: StorageBackend,
    /// Database file (sqlite) or directory (file). Defaults under `~/.mode0/data`.
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Resolve the storage location for the configured backend.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| match self.backend {
            StorageBackend::File => util::data_dir().join("profiles"),
            StorageBackend::Sqlite | StorageBackend::Memory => util::data_dir().join("mode_0.db"),
        })
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Response probabilities used by the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Probability of answering a message that mentions the bot.
    pub mention_response_rate: Rate,
    /// Probability of answering a question.
    pub direct_question_rate: Rate,
    /// Probability of answering any other chat message.
    pub general_chat_rate: Rate,
    /// Probability of starting a conversation on an idle event.
    pub idle_chat_rate: Rate,
    /// Probability of greeting a first-time or returning chatter.
    pub greeting_rate: Rate,
    /// Seconds since `last_seen` after which a chatter counts as returning.
    pub greeting_absence_secs: u64,
    /// Added to `general_chat_rate` when a message hits an engagement topic.
    pub topic_boost: Rate,
    /// Fixed seed for the decision generator; random when absent.
    pub seed: Option<u64>,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            mention_response_rate: Rate::ALWAYS,
            direct_question_rate: Rate(0.9),
            general_chat_rate: Rate(0.3),
            idle_chat_rate: Rate(0.5),
            greeting_rate: Rate::ALWAYS,
            greeting_absence_secs: 30 * 60,
            topic_boost: Rate(0.2),
            seed: None,
        }
    }
}

/// Human-like response delay bounds, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTimingConfig {
    /// Lower bound of the response delay.
    pub min_delay: f64,
    /// Upper bound of the response delay.
    pub max_delay: f64,
    /// Chat replies to a user answered less than this long ago are deferred.
    pub user_cooldown: f64,
}

impl Default for ResponseTimingConfig {
    fn default() -> Self {
        Self {
            min_delay: 1.0,
            max_delay: 3.0,
            user_cooldown: 10.0,
        }
    }
}

/// Idle-chat scheduler settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Minimum seconds between two idle events.
    pub cooldown_secs: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self { cooldown_secs: 300 }
    }
}

/// Event queue settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Bounded queue capacity.
    pub capacity: usize,
    /// Seconds the dispatcher keeps draining after shutdown is requested.
    pub drain_grace_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            drain_grace_secs: 5,
        }
    }
}

/// Retry policy for storage writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts before a write is abandoned (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each further retry.
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

/// Topics the persona cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Topics recorded as user interests when mentioned.
    pub preferred: Vec<String>,
    /// Topics that also raise the general chat response rate.
    pub engagement_boost: Vec<String>,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            preferred: ["music", "dj", "hard house", "electronic", "streaming", "events"]
                .map(String::from)
                .to_vec(),
            engagement_boost: ["qwazi905", "hard house", "dj", "new release"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Persona tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// How far one message moves a user's mood bias toward its sentiment.
    pub learning_rate: f64,
    /// Topic lists.
    pub topics: TopicsConfig,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            topics: TopicsConfig::default(),
        }
    }
}

fn default_commands() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "help".to_string(),
            "@{username} Available commands: !help, !about, !socials".to_string(),
        ),
        (
            "about".to_string(),
            "@{username} I'm Mode_0, a custom bot for DJ Qwazi905's channel!".to_string(),
        ),
        (
            "socials".to_string(),
            "@{username} Follow DJ Qwazi905 on: Twitch: twitch.tv/Qwazi905 | Twitter: x.com/Qwazi905 | SoundCloud: soundcloud.com/qwaziqwazi905".to_string(),
        ),
    ])
}

// ============================================================================
// BotConfig
// ============================================================================

/// Complete bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Twitch connection.
    pub twitch: TwitchConfig,
    /// StreamElements event source.
    pub streamelements: StreamElementsConfig,
    /// General behavior.
    pub bot: BotSection,
    /// Profile storage.
    pub database: DatabaseConfig,
    /// Logging.
    pub logging: LoggingConfig,
    /// Response probabilities.
    pub engagement: EngagementConfig,
    /// Response delay bounds.
    pub response_timing: ResponseTimingConfig,
    /// Idle scheduler.
    pub idle: IdleConfig,
    /// Event queue.
    pub queue: QueueConfig,
    /// Storage retry policy.
    pub storage_retry: RetryConfig,
    /// Persona tuning.
    pub persona: PersonaConfig,
    /// Response templates.
    pub responses: ResponseTemplates,
    /// Command name (without prefix) to reply template.
    pub commands: BTreeMap<String, String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            twitch: TwitchConfig::default(),
            streamelements: StreamElementsConfig::default(),
            bot: BotSection::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            engagement: EngagementConfig::default(),
            response_timing: ResponseTimingConfig::default(),
            idle: IdleConfig::default(),
            queue: QueueConfig::default(),
            storage_retry: RetryConfig::default(),
            persona: PersonaConfig::default(),
            responses: ResponseTemplates::default(),
            commands: default_commands(),
        }
    }
}

impl BotConfig {
    /// Parse a configuration document, applying defaults and validation.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Look up a value by dot-separated key path (e.g. `engagement.idle_chat_rate`).
    ///
    /// Defaults are part of the document, so every documented key resolves.
    #[must_use]
    pub fn get(&self, key_path: &str) -> Option<serde_json::Value> {
        let mut value = serde_json::to_value(self).ok()?;
        for key in key_path.split('.') {
            value = match value {
                serde_json::Value::Object(mut map) => map.remove(key)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Idle interval before the first idle event.
    #[must_use]
    pub const fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.bot.engagement_interval)
    }

    /// Minimum spacing between idle events.
    #[must_use]
    pub const fn idle_cooldown(&self) -> Duration {
        Duration::from_secs(self.idle.cooldown_secs)
    }

    /// Grace period for draining the queue on shutdown.
    #[must_use]
    pub const fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.queue.drain_grace_secs)
    }

    /// Channel the bot speaks in; the bot's own nick when none is set.
    #[must_use]
    pub fn channel(&self) -> &str {
        let channel = self.twitch.channel.trim().trim_start_matches('#');
        if channel.is_empty() {
            &self.twitch.nick
        } else {
            channel
        }
    }

    /// Collect every problem with this configuration.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let timing = self.response_timing;

        let max_secs = MAX_DURATION_SECS as f64;
        if !timing.min_delay.is_finite() || !(0.0..=max_secs).contains(&timing.min_delay) {
            issues.push(ConfigIssue::error(
                "response_timing.min_delay",
                "must be between 0 and 30 days, in seconds",
            ));
        }
        if !timing.max_delay.is_finite()
            || timing.max_delay < timing.min_delay
            || timing.max_delay > max_secs
        {
            issues.push(ConfigIssue::error(
                "response_timing.max_delay",
                "must be a number of seconds not below min_delay and at most 30 days",
            ));
        }
        if !timing.user_cooldown.is_finite() || !(0.0..=max_secs).contains(&timing.user_cooldown) {
            issues.push(ConfigIssue::error(
                "response_timing.user_cooldown",
                "must be between 0 and 30 days, in seconds",
            ));
        }
        check_secs(&mut issues, "bot.engagement_interval", self.bot.engagement_interval, 1);
        check_secs(&mut issues, "idle.cooldown_secs", self.idle.cooldown_secs, 1);
        check_secs(&mut issues, "queue.drain_grace_secs", self.queue.drain_grace_secs, 0);
        check_secs(
            &mut issues,
            "engagement.greeting_absence_secs",
            self.engagement.greeting_absence_secs,
            0,
        );
        if self.queue.capacity == 0 {
            issues.push(ConfigIssue::error("queue.capacity", "must be at least 1"));
        }
        if self.storage_retry.max_attempts == 0 {
            issues.push(ConfigIssue::error(
                "storage_retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.storage_retry.base_delay_ms > self.storage_retry.max_delay_ms {
            issues.push(ConfigIssue::error(
                "storage_retry.base_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&self.persona.learning_rate) {
            issues.push(ConfigIssue::error(
                "persona.learning_rate",
                "must be within [0, 1]",
            ));
        }
        if self.bot.name.trim().is_empty() {
            issues.push(ConfigIssue::error("bot.name", "must not be empty"));
        }
        if self.bot.command_prefix.is_empty() {
            issues.push(ConfigIssue::error("bot.command_prefix", "must not be empty"));
        }

        if self.twitch.channel.is_empty() {
            issues.push(ConfigIssue::warning("twitch.channel", "no channel configured"));
        }
        if self.twitch.oauth_token.is_none() {
            issues.push(ConfigIssue::warning("twitch.oauth_token", "no token configured"));
        }
        if self.streamelements.jwt.is_none() {
            issues.push(ConfigIssue::warning(
                "streamelements.jwt",
                "no token configured; platform events need an external client",
            ));
        }

        issues
    }

    /// Fail with [`ConfigError::Invalid`] if any error-level issue exists.
    pub fn ensure_valid(&self) -> ConfigResult<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|issue| issue.level == IssueLevel::Error)
            .map(|issue| issue.to_string())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::invalid(errors.join("; ")))
        }
    }
}

fn check_secs(issues: &mut Vec<ConfigIssue>, path: &'static str, value: u64, min: u64) {
    if !(min..=MAX_DURATION_SECS).contains(&value) {
        let message = if min == 0 {
            "must be at most 30 days, in seconds"
        } else {
            "must be between one second and 30 days"
        };
        issues.push(ConfigIssue::error(path, message));
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The bot cannot start with this value.
    Error,
    /// The bot starts but some feature will not work.
    Warning,
}

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Dot-separated key path of the offending value.
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl ConfigIssue {
    fn error(path: &str, message: &str) -> Self {
        Self {
            level: IssueLevel::Error,
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    fn warning(path: &str, message: &str) -> Self {
        Self {
            level: IssueLevel::Warning,
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

// ============================================================================
// Loading & saving
// ============================================================================

/// Default configuration file path.
#[must_use]
pub fn config_path() -> PathBuf {
    util::config_path()
}

/// Load configuration from the default path.
pub async fn load_config() -> ConfigResult<BotConfig> {
    load_config_from(&config_path()).await
}

/// Load configuration from `path`.
///
/// A missing file yields the defaults; an unreadable, unparsable or invalid
/// file is an error.
pub async fn load_config_from(path: &Path) -> ConfigResult<BotConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "configuration file not found, using defaults");
        return Ok(BotConfig::default());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config = BotConfig::from_json(&content)?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Write `config` to `path`, creating parent directories.
pub async fn save_config(config: &BotConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    debug!(path = %path.display(), "configuration saved");
    Ok(())
}

/// Write a default configuration file to the default path.
pub async fn init_config() -> ConfigResult<PathBuf> {
    let path = config_path();
    save_config(&BotConfig::default(), &path).await?;
    info!(path = %path.display(), "default configuration written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BotConfig::default();
        assert!(config.ensure_valid().is_ok());
        assert_eq!(config.engagement.mention_response_rate, Rate::ALWAYS);
        assert_eq!(config.idle_interval(), Duration::from_secs(600));
        assert_eq!(config.commands.len(), 3);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = BotConfig::from_json(
            r#"{ "engagement": { "general_chat_rate": 0.1 }, "bot": { "name": "Zero" } }"#,
        )
        .unwrap();
        assert!((config.engagement.general_chat_rate.get() - 0.1).abs() < f64::EPSILON);
        assert!((config.engagement.direct_question_rate.get() - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.bot.name, "Zero");
        assert_eq!(config.bot.command_prefix, "!");
        assert_eq!(config.queue.capacity, 256);
    }

    #[test]
    fn test_rate_out_of_range_rejected_at_load() {
        let err = BotConfig::from_json(r#"{ "engagement": { "idle_chat_rate": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("outside [0, 1]"));

        assert!(Rate::new(-0.1).is_err());
        assert!(Rate::new(f64::NAN).is_err());
        assert!(Rate::new(0.0).is_ok());
    }

    #[test]
    fn test_invalid_timing_rejected() {
        let err = BotConfig::from_json(
            r#"{ "response_timing": { "min_delay": 5, "max_delay": 2 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("response_timing.max_delay"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = BotConfig::default();
        config.bot.engagement_interval = 0;
        config.queue.capacity = 0;
        let err = config.ensure_valid().unwrap_err().to_string();
        assert!(err.contains("bot.engagement_interval"));
        assert!(err.contains("queue.capacity"));
    }

    #[test]
    fn test_unbounded_durations_rejected() {
        let err = BotConfig::from_json(r#"{ "queue": { "drain_grace_secs": 18446744073709551615 } }"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("queue.drain_grace_secs"));

        let mut config = BotConfig::default();
        config.bot.engagement_interval = u64::MAX;
        config.idle.cooldown_secs = MAX_DURATION_SECS + 1;
        config.response_timing.max_delay = 1e12;
        let err = config.ensure_valid().unwrap_err().to_string();
        assert!(err.contains("bot.engagement_interval"));
        assert!(err.contains("idle.cooldown_secs"));
        assert!(err.contains("response_timing.max_delay"));

        config = BotConfig::default();
        config.idle.cooldown_secs = MAX_DURATION_SECS;
        config.queue.drain_grace_secs = 0;
        assert!(config.ensure_valid().is_ok());
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let config = BotConfig::default();
        let issues = config.validate();
        assert!(issues.iter().all(|i| i.level == IssueLevel::Warning));
        assert!(issues.iter().any(|i| i.path == "twitch.oauth_token"));
    }

    #[test]
    fn test_key_path_lookup() {
        let config = BotConfig::default();
        assert_eq!(
            config.get("engagement.idle_chat_rate"),
            Some(serde_json::json!(0.5))
        );
        assert_eq!(config.get("bot.command_prefix"), Some(serde_json::json!("!")));
        assert_eq!(config.get("bot.missing"), None);
        assert_eq!(config.get("bot.name.deeper"), None);
    }

    #[test]
    fn test_channel_falls_back_to_nick() {
        let mut config = BotConfig::default();
        assert_eq!(config.channel(), "mode_0");
        config.twitch.channel = "#qwazi905".to_string();
        assert_eq!(config.channel(), "qwazi905");
    }

    #[test]
    fn test_rate_boost_caps() {
        let rate = Rate::new(0.9).unwrap();
        assert_eq!(rate.boosted(Rate::new(0.5).unwrap()), Rate::ALWAYS);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "mode0-config-test-{}-{}.json",
            std::process::id(),
            util::timestamp_ms()
        ));
        let mut config = BotConfig::default();
        config.twitch.channel = "qwazi905".to_string();
        save_config(&config, &path).await.unwrap();

        let loaded = load_config_from(&path).await.unwrap();
        assert_eq!(loaded.twitch.channel, "qwazi905");
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("mode0-config-does-not-exist.json");
        let config = load_config_from(&path).await.unwrap();
        assert_eq!(config.bot.name, "Mode_0");
    }
}

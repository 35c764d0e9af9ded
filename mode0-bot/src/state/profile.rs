//! Per-user conversational state.

use crate::error::{StorageError, StorageResult};
use crate::events::NormalizedEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything the bot remembers about one viewer.
///
/// Persisted as an opaque JSON blob keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    /// Unique key.
    pub user_id: String,
    /// Login name, when known.
    #[serde(default)]
    pub username: Option<String>,
    /// Display name, when known.
    #[serde(default)]
    pub display_name: Option<String>,
    /// First time any event referenced this user (Unix ms, 0 if never).
    #[serde(default)]
    pub first_seen: u64,
    /// Latest event referencing this user (Unix ms, 0 if never).
    #[serde(default)]
    pub last_seen: u64,
    /// Chat messages attributed to this user. Never decreases.
    #[serde(default)]
    pub message_count: u64,
    /// Interest tags inferred from chat.
    #[serde(default)]
    pub interests: BTreeSet<String>,
    /// Mood contribution in `[-1, 1]`.
    #[serde(default)]
    pub mood_bias: f64,
    /// Last time the bot replied to this user (Unix ms).
    #[serde(default)]
    pub last_response_at: Option<u64>,
}

impl UserState {
    /// Fresh state for a user that has never been seen.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            display_name: None,
            first_seen: 0,
            last_seen: 0,
            message_count: 0,
            interests: BTreeSet::new(),
            mood_bias: 0.0,
            last_response_at: None,
        }
    }

    /// Name to address the user by.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.user_id)
    }

    /// Milliseconds since the user was last seen, `None` if never.
    #[must_use]
    pub const fn since_last_seen(&self, now_ms: u64) -> Option<u64> {
        if self.last_seen == 0 {
            None
        } else {
            Some(now_ms.saturating_sub(self.last_seen))
        }
    }

    /// Record that an event referencing this user was observed at `now_ms`.
    ///
    /// Refreshes the names carried by the event.
    pub fn record_seen(&mut self, event: &NormalizedEvent, now_ms: u64) {
        if self.first_seen == 0 {
            self.first_seen = now_ms;
        }
        self.last_seen = self.last_seen.max(now_ms);
        if let Some(name) = event.username() {
            self.username = Some(name.to_string());
        }
        if let Some(name) = event.display_name() {
            self.display_name = Some(name.to_string());
        }
    }

    /// Count one chat message at `now_ms`.
    pub fn record_message(&mut self, now_ms: u64) {
        if self.first_seen == 0 {
            self.first_seen = now_ms;
        }
        self.message_count = self.message_count.saturating_add(1);
        self.last_seen = self.last_seen.max(now_ms);
    }

    /// Merge inferred interest tags.
    pub fn add_interests<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests.extend(tags.into_iter().map(Into::into));
    }

    /// Move `mood_bias` towards `score` by `rate`, clamped to `[-1, 1]`.
    pub fn nudge_mood(&mut self, score: f64, rate: f64) {
        let next = self.mood_bias + (score - self.mood_bias) * rate;
        self.mood_bias = if next.is_finite() {
            next.clamp(-1.0, 1.0)
        } else {
            self.mood_bias
        };
    }

    /// Encode as the persistent JSON blob.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if serialization fails.
    pub fn to_blob(&self) -> StorageResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a persistent JSON blob.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the blob is not a valid profile.
    pub fn from_blob(blob: &str) -> StorageResult<Self> {
        let mut state: Self = serde_json::from_str(blob)?;
        if state.user_id.is_empty() {
            return Err(StorageError::InvalidKey(state.user_id));
        }
        state.mood_bias = state.mood_bias.clamp(-1.0, 1.0);
        Ok(state)
    }
}

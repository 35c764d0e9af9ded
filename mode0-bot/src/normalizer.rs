//! Raw event validation and id allocation.

use crate::error::{EventError, EventResult};
use crate::events::{EventKind, NormalizedEvent, RawEvent};
use crate::util::timestamp_ms;
use std::sync::atomic::{AtomicU64, Ordering};

/// Converts [`RawEvent`]s into [`NormalizedEvent`]s.
///
/// The only state is the id counter, so one normalizer is shared (behind an
/// `Arc`) by every producer, the idle scheduler included. Ids are unique and
/// strictly increasing for the lifetime of the normalizer.
#[derive(Debug, Default)]
pub struct EventNormalizer {
    next_id: AtomicU64,
}

impl EventNormalizer {
    /// Create a normalizer whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Validate `raw` and build the pipeline event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] when the kind or channel is missing, the kind
    /// tag is unknown, or no actor identity can be derived. No id is consumed
    /// for a rejected event.
    pub fn normalize(&self, raw: RawEvent) -> EventResult<NormalizedEvent> {
        let tag = non_blank(raw.kind).ok_or(EventError::MissingField("kind"))?;
        let kind = EventKind::from_tag(&tag).ok_or(EventError::UnknownKind(tag))?;
        let channel = non_blank(raw.channel).ok_or(EventError::MissingField("channel"))?;

        let username = non_blank(raw.username);
        let user_id = match kind {
            EventKind::ChatMessage => {
                Some(non_blank(raw.user_id).ok_or(EventError::MissingField("user_id"))?)
            }
            // Event-source payloads usually carry only a name.
            _ => Some(
                non_blank(raw.user_id)
                    .or_else(|| username.as_ref().map(|name| name.to_lowercase()))
                    .ok_or(EventError::MissingField("user_id"))?,
            ),
        };

        Ok(NormalizedEvent::new(
            self.allocate_id(),
            kind,
            user_id,
            username,
            non_blank(raw.display_name),
            channel.trim_start_matches('#').to_string(),
            raw.content,
            raw.timestamp.unwrap_or_else(timestamp_ms),
            raw.data,
        ))
    }

    /// Mint a synthetic idle event for `channel`.
    pub fn idle(&self, channel: &str) -> NormalizedEvent {
        NormalizedEvent::idle(self.allocate_id(), channel)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

//! Producer-side entry point of the pipeline.

use crate::error::{EventError, QueueError};
use crate::events::{EventKind, RawEvent};
use crate::idle::ActivityTracker;
use crate::normalizer::EventNormalizer;
use crate::queue::EventQueue;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of pushing one raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressOutcome {
    /// Normalized and queued under this event id.
    Queued(u64),
    /// Malformed; logged and dropped.
    Malformed(EventError),
    /// Queue was full or closed; logged and dropped.
    Rejected(QueueError),
}

impl IngressOutcome {
    /// Whether the event made it into the queue.
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Cheap, cloneable handle listeners use to push raw events.
///
/// Normalizes, records chat activity for the idle scheduler, and submits
/// without waiting. Nothing here can fail the caller: every problem is
/// logged and reported in the returned [`IngressOutcome`].
#[derive(Debug, Clone)]
pub struct EventIngress {
    normalizer: Arc<EventNormalizer>,
    queue: EventQueue,
    activity: ActivityTracker,
}

impl EventIngress {
    /// Create an ingress handle.
    pub fn new(normalizer: Arc<EventNormalizer>, queue: EventQueue, activity: ActivityTracker) -> Self {
        Self {
            normalizer,
            queue,
            activity,
        }
    }

    /// Push one raw event into the pipeline.
    pub fn push(&self, raw: RawEvent) -> IngressOutcome {
        let event = match self.normalizer.normalize(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping malformed event");
                return IngressOutcome::Malformed(e);
            }
        };

        let event_id = event.id();
        let kind = event.kind();
        if kind == EventKind::ChatMessage {
            self.activity.record();
        }

        match self.queue.submit(event) {
            Ok(()) => {
                debug!(event_id, %kind, "event accepted");
                IngressOutcome::Queued(event_id)
            }
            Err(e) => {
                warn!(event_id, %kind, error = %e, "dropping event");
                IngressOutcome::Rejected(e)
            }
        }
    }
}

//! Bounded event queue between producers and the dispatcher.
//!
//! Producers (chat connection, event-source client, idle scheduler) submit
//! without waiting: a full queue rejects the event immediately instead of
//! applying backpressure to the connection. There is exactly one consumer;
//! the receiver can be taken once.

use crate::error::{QueueError, QueueResult};
use crate::events::NormalizedEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Bounded FIFO of normalized events.
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<EventQueueInner>,
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

struct EventQueueInner {
    tx: mpsc::Sender<NormalizedEvent>,
    rx: Mutex<Option<mpsc::Receiver<NormalizedEvent>>>,
    capacity: usize,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
    accepted: AtomicU64,
    rejected: AtomicU64,
    requeued: AtomicU64,
    discarded: AtomicU64,
}

/// Queue statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Events accepted from producers.
    pub accepted: u64,
    /// Events rejected because the queue was saturated.
    pub rejected: u64,
    /// Deferred events put back at the tail.
    pub requeued: u64,
    /// Events discarded at shutdown after the drain grace period.
    pub discarded: u64,
}

impl EventQueue {
    /// Create a queue with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a queue holding at most `capacity` events.
    ///
    /// A zero capacity is bumped to one; tokio channels cannot be empty.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (closed_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(EventQueueInner {
                tx,
                rx: Mutex::new(Some(rx)),
                capacity,
                closed: AtomicBool::new(false),
                closed_tx,
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                requeued: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// Submit an event without waiting.
    ///
    /// # Errors
    ///
    /// [`QueueError::Saturated`] when the queue is full (the event is
    /// dropped and counted), [`QueueError::Closed`] once shutdown started.
    pub fn submit(&self, event: NormalizedEvent) -> QueueResult<()> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        let event_id = event.id();
        match self.inner.tx.try_send(event) {
            Ok(()) => {
                self.inner.accepted.fetch_add(1, Ordering::Relaxed);
                trace!(event_id, "event queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.inner.rejected.fetch_add(1, Ordering::Relaxed);
                Err(QueueError::Saturated {
                    capacity: self.inner.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Put a deferred event back at the tail.
    ///
    /// Allowed while draining after [`close`](Self::close) so the event still
    /// gets its second pass within the grace period.
    pub(crate) fn requeue(&self, event: NormalizedEvent) -> QueueResult<()> {
        match self.inner.tx.try_send(event) {
            Ok(()) => {
                self.inner.requeued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(QueueError::Saturated {
                capacity: self.inner.capacity,
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Take the consumer side. Only the first call succeeds.
    ///
    /// # Errors
    ///
    /// [`QueueError::ReceiverTaken`] on every call after the first.
    pub fn take_receiver(&self) -> QueueResult<mpsc::Receiver<NormalizedEvent>> {
        self.inner
            .rx
            .lock()
            .map_err(|_| QueueError::ReceiverTaken)?
            .take()
            .ok_or(QueueError::ReceiverTaken)
    }

    /// Stop accepting new events. Idempotent.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!(pending = self.len(), "event queue closed");
            self.inner.closed_tx.send_replace(true);
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Watch that flips to `true` when the queue closes.
    #[must_use]
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.inner.closed_tx.subscribe()
    }

    /// Whether a submit right now would be rejected as saturated.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.inner.tx.capacity() == 0
    }

    /// Number of events waiting to be consumed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.capacity - self.inner.tx.capacity()
    }

    /// Whether no events are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Record events thrown away at shutdown.
    pub(crate) fn record_discarded(&self, count: u64) {
        if count > 0 {
            warn!(count, "discarding events left after drain grace period");
        }
        self.inner.discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            accepted: self.inner.accepted.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            requeued: self.inner.requeued.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

//! Idle-chat scheduler.
//!
//! Watches chat activity and, when the channel has been quiet for the
//! configured interval, injects one synthetic [`EventKind::Idle`] event into
//! the queue. After firing it waits out a cooldown before it may fire again;
//! any chat message resets the inactivity timer.
//!
//! [`EventKind::Idle`]: crate::events::EventKind::Idle

use crate::error::QueueError;
use crate::normalizer::EventNormalizer;
use crate::queue::EventQueue;
use crate::util::{deadline_after, format_duration};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// Activity Tracking
// ============================================================================

/// Shared record of the last chat activity.
///
/// Ingress calls [`record`](Self::record) for every accepted chat message;
/// the scheduler subscribes to the changes.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    tx: Arc<watch::Sender<Instant>>,
}

impl ActivityTracker {
    /// Create a tracker whose last activity is now.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Instant::now());
        Self { tx: Arc::new(tx) }
    }

    /// Record chat activity at the current instant.
    pub fn record(&self) {
        self.tx.send_replace(Instant::now());
    }

    /// Instant of the last recorded activity.
    #[must_use]
    pub fn last(&self) -> Instant {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Instant> {
        self.tx.subscribe()
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Idle scheduler settings.
#[derive(Debug, Clone)]
pub struct IdleSettings {
    /// Silence required before the first idle event.
    pub interval: Duration,
    /// Minimum time between two idle events.
    pub cooldown: Duration,
    /// Channel the idle events target.
    pub channel: String,
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            cooldown: Duration::from_secs(300),
            channel: String::new(),
        }
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdleState {
    /// Chat is active; counting towards the inactivity interval.
    #[default]
    Watching,
    /// An idle event was fired and no chat has arrived since.
    Idle,
}

/// Scheduler status snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleStatus {
    /// Current state.
    pub state: IdleState,
    /// Idle events submitted to the queue.
    pub fired: u64,
    /// Idle slots skipped because the queue was saturated.
    pub skipped: u64,
    /// Whether the loop is running.
    pub running: bool,
}

/// Handle for controlling a running scheduler.
#[derive(Debug)]
pub struct IdleHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
    status: Arc<RwLock<IdleStatus>>,
}

impl IdleHandle {
    /// Stop the scheduler and wait for the loop to exit.
    ///
    /// No final idle event is emitted.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "idle scheduler task failed");
        }
    }

    /// Current status.
    pub async fn status(&self) -> IdleStatus {
        let mut status = *self.status.read().await;
        status.running &= !self.task.is_finished();
        status
    }
}

/// Timed loop that injects idle events.
#[derive(Debug)]
pub struct IdleScheduler {
    settings: IdleSettings,
    normalizer: Arc<EventNormalizer>,
    queue: EventQueue,
    activity: ActivityTracker,
}

impl IdleScheduler {
    /// Create a scheduler.
    pub fn new(
        settings: IdleSettings,
        normalizer: Arc<EventNormalizer>,
        queue: EventQueue,
        activity: ActivityTracker,
    ) -> Self {
        Self {
            settings,
            normalizer,
            queue,
            activity,
        }
    }

    /// Spawn the scheduler loop.
    #[must_use]
    pub fn start(self) -> IdleHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let status = Arc::new(RwLock::new(IdleStatus::default()));
        let task_status = Arc::clone(&status);
        let mut activity = self.activity.subscribe();

        let task = tokio::spawn(async move {
            task_status.write().await.running = true;
            info!(
                interval = %format_duration(self.settings.interval),
                cooldown = %format_duration(self.settings.cooldown),
                channel = %self.settings.channel,
                "idle scheduler started"
            );

            let mut last_fire: Option<Instant> = None;
            let mut activity_open = true;

            loop {
                let due = self.next_fire(*activity.borrow_and_update(), last_fire);

                tokio::select! {
                    () = tokio::time::sleep_until(due) => {
                        last_fire = Some(Instant::now());
                        if !self.fire(&task_status).await {
                            break;
                        }
                    }
                    changed = activity.changed(), if activity_open => {
                        if changed.is_err() {
                            activity_open = false;
                        }
                        let mut status = task_status.write().await;
                        if status.state == IdleState::Idle {
                            debug!("chat resumed, watching");
                            status.state = IdleState::Watching;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("idle scheduler shutting down");
                        break;
                    }
                }
            }

            task_status.write().await.running = false;
        });

        IdleHandle {
            shutdown_tx,
            task,
            status,
        }
    }

    fn next_fire(&self, last_activity: Instant, last_fire: Option<Instant>) -> Instant {
        let after_silence = deadline_after(last_activity, self.settings.interval);
        last_fire.map_or(after_silence, |fired| {
            after_silence.max(deadline_after(fired, self.settings.cooldown))
        })
    }

    /// Submit one idle event. Returns `false` once the queue is closed.
    async fn fire(&self, status: &RwLock<IdleStatus>) -> bool {
        if self.queue.is_saturated() {
            debug!("queue saturated, skipping idle event");
            status.write().await.skipped += 1;
            return true;
        }

        let event = self.normalizer.idle(&self.settings.channel);
        let event_id = event.id();
        match self.queue.submit(event) {
            Ok(()) => {
                debug!(event_id, "idle event injected");
                let mut s = status.write().await;
                s.fired += 1;
                s.state = IdleState::Idle;
                true
            }
            Err(QueueError::Saturated { .. }) => {
                status.write().await.skipped += 1;
                true
            }
            Err(e) => {
                debug!(error = %e, "queue gone, stopping idle scheduler");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    const MINUTE: Duration = Duration::from_secs(60);

    fn settings(interval: Duration, cooldown: Duration) -> IdleSettings {
        IdleSettings {
            interval,
            cooldown,
            channel: "qwazi905".into(),
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(total: Duration) {
        let step = Duration::from_secs(30);
        let mut elapsed = Duration::ZERO;
        while elapsed + step <= total {
            tokio::time::advance(step).await;
            settle().await;
            elapsed += step;
        }
        tokio::time::advance(total - elapsed).await;
        settle().await;
    }

    fn drain(rx: &mut mpsc::Receiver<crate::events::NormalizedEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.kind(), EventKind::Idle);
            assert_eq!(event.channel(), "qwazi905");
            count += 1;
        }
        count
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_per_cooldown_window() {
        let queue = EventQueue::with_capacity(16);
        let mut rx = queue.take_receiver().unwrap();
        let activity = ActivityTracker::new();
        let handle = IdleScheduler::new(
            settings(5 * MINUTE, 5 * MINUTE),
            Arc::new(EventNormalizer::new()),
            queue,
            activity,
        )
        .start();
        settle().await;

        advance(20 * MINUTE + Duration::from_secs(1)).await;

        assert_eq!(drain(&mut rx), 4);
        let status = handle.status().await;
        assert_eq!(status.fired, 4);
        assert_eq!(status.state, IdleState::Idle);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_activity_resets_timer() {
        let queue = EventQueue::with_capacity(16);
        let mut rx = queue.take_receiver().unwrap();
        let activity = ActivityTracker::new();
        let handle = IdleScheduler::new(
            settings(5 * MINUTE, 5 * MINUTE),
            Arc::new(EventNormalizer::new()),
            queue,
            activity.clone(),
        )
        .start();
        settle().await;

        advance(4 * MINUTE).await;
        activity.record();
        settle().await;
        advance(4 * MINUTE).await;
        assert_eq!(drain(&mut rx), 0);

        advance(MINUTE + Duration::from_secs(1)).await;
        assert_eq!(drain(&mut rx), 1);

        // Chat moves the scheduler back to watching.
        activity.record();
        settle().await;
        assert_eq!(handle.status().await.state, IdleState::Watching);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_queue_skips_slot() {
        let queue = EventQueue::with_capacity(1);
        let normalizer = Arc::new(EventNormalizer::new());
        queue.submit(normalizer.idle("filler")).unwrap();

        let handle = IdleScheduler::new(
            settings(MINUTE, MINUTE),
            Arc::clone(&normalizer),
            queue.clone(),
            ActivityTracker::new(),
        )
        .start();
        settle().await;

        advance(MINUTE + Duration::from_secs(1)).await;
        let status = handle.status().await;
        assert_eq!(status.fired, 0);
        assert_eq!(status.skipped, 1);
        assert_eq!(queue.len(), 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_never_fires() {
        let queue = EventQueue::with_capacity(4);
        let handle = IdleScheduler::new(
            settings(Duration::MAX, Duration::MAX),
            Arc::new(EventNormalizer::new()),
            queue.clone(),
            ActivityTracker::new(),
        )
        .start();
        settle().await;

        advance(10 * MINUTE).await;
        let status = handle.status().await;
        assert!(status.running);
        assert_eq!(status.fired, 0);
        assert!(queue.is_empty());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_prompt() {
        let queue = EventQueue::with_capacity(4);
        let handle = IdleScheduler::new(
            settings(10 * MINUTE, MINUTE),
            Arc::new(EventNormalizer::new()),
            queue.clone(),
            ActivityTracker::new(),
        )
        .start();
        settle().await;
        assert!(handle.status().await.running);

        handle.stop().await;
        assert!(queue.is_empty());
    }
}

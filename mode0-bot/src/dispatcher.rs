//! The single-consumer dispatch loop.
//!
//! Events leave the queue in order. For each one the dispatcher loads the
//! user's state, decides against that state as it was *before* the event,
//! applies the event to the store, then executes the decision. A failure
//! while handling one event is logged and never stops the loop.

use crate::chat::ChatConnection;
use crate::config::BotConfig;
use crate::decision::{Action, DecisionEngine, ResponseCategory};
use crate::error::{Result, StorageResult};
use crate::events::{EventKind, NormalizedEvent, OutboundMessage};
use crate::persona::{ProfileAnalyzer, ResponseComposer};
use crate::queue::EventQueue;
use crate::state::{UserState, UserStateStore};
use crate::util::{deadline_after, time_since, timestamp_ms, truncate_str};
use fastrand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Events pulled from the queue, second passes included.
    pub handled: u64,
    /// Messages delivered to chat.
    pub responded: u64,
    /// Events that ended without a message.
    pub ignored: u64,
    /// Events sent back to the queue tail.
    pub deferred: u64,
    /// Events put back behind a deferred event from the same user.
    pub held: u64,
    /// Messages the chat connection refused.
    pub send_failures: u64,
    /// Storage failures while loading or updating a profile.
    pub errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    handled: AtomicU64,
    responded: AtomicU64,
    ignored: AtomicU64,
    deferred: AtomicU64,
    held: AtomicU64,
    send_failures: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            handled: self.handled.load(Ordering::Relaxed),
            responded: self.responded.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            held: self.held.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running dispatcher.
#[derive(Debug)]
pub struct DispatcherHandle {
    task: JoinHandle<()>,
    stats: Arc<Counters>,
}

impl DispatcherHandle {
    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        self.stats.snapshot()
    }

    /// Wait for the loop to finish draining.
    ///
    /// The loop only ends once the queue is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher task panicked.
    pub async fn join(self) -> Result<DispatcherStats> {
        self.task.await?;
        Ok(self.stats.snapshot())
    }
}

/// Consumes the event queue and drives responses.
pub struct Dispatcher {
    queue: EventQueue,
    store: Arc<UserStateStore>,
    engine: DecisionEngine,
    composer: ResponseComposer,
    analyzer: ProfileAnalyzer,
    chat: Arc<dyn ChatConnection>,
    drain_grace: Duration,
    rng: Rng,
    deferred: HashSet<u64>,
    waiting: HashSet<String>,
    stats: Arc<Counters>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("chat", &self.chat.name())
            .field("drain_grace", &self.drain_grace)
            .field("deferred", &self.deferred.len())
            .field("waiting", &self.waiting.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with a random generator and a 5 second drain.
    #[must_use]
    pub fn new(
        queue: EventQueue,
        store: Arc<UserStateStore>,
        engine: DecisionEngine,
        composer: ResponseComposer,
        analyzer: ProfileAnalyzer,
        chat: Arc<dyn ChatConnection>,
    ) -> Self {
        Self {
            queue,
            store,
            engine,
            composer,
            analyzer,
            chat,
            drain_grace: Duration::from_secs(5),
            rng: Rng::new(),
            deferred: HashSet::new(),
            waiting: HashSet::new(),
            stats: Arc::new(Counters::default()),
        }
    }

    /// Dispatcher with engine, composer, analyzer, seed and drain grace
    /// taken from `config`.
    #[must_use]
    pub fn from_config(
        config: &BotConfig,
        queue: EventQueue,
        store: Arc<UserStateStore>,
        chat: Arc<dyn ChatConnection>,
    ) -> Self {
        Self::new(
            queue,
            store,
            DecisionEngine::from_config(config),
            ResponseComposer::from_config(config),
            ProfileAnalyzer::new(&config.persona),
            chat,
        )
        .with_seed(config.engagement.seed)
        .with_drain_grace(config.drain_grace())
    }

    /// Seed the decision generator; `None` keeps a random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if let Some(seed) = seed {
            self.rng = Rng::with_seed(seed);
        }
        self
    }

    /// How long to keep handling queued events after the queue closes.
    #[must_use]
    pub const fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Take the queue's consumer side and spawn the loop.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ReceiverTaken`](crate::error::QueueError::ReceiverTaken)
    /// if another consumer already owns the queue.
    pub fn start(self) -> Result<DispatcherHandle> {
        let rx = self.queue.take_receiver()?;
        let stats = Arc::clone(&self.stats);
        let task = tokio::spawn(self.run(rx));
        Ok(DispatcherHandle { task, stats })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<NormalizedEvent>) {
        let mut closed = self.queue.closed_signal();
        info!(connection = %self.chat.name(), "dispatcher started");

        loop {
            if *closed.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                _ = closed.changed() => {}
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event).await;
                }
            }
        }

        self.drain(&mut rx).await;
        let stats = self.stats.snapshot();
        info!(
            handled = stats.handled,
            responded = stats.responded,
            deferred = stats.deferred,
            "dispatcher stopped"
        );
    }

    /// Handle what is left in the queue within the grace period, then
    /// discard the rest.
    async fn drain(&mut self, rx: &mut mpsc::Receiver<NormalizedEvent>) {
        let deadline = deadline_after(Instant::now(), self.drain_grace);
        let mut discarded = 0_u64;

        while let Ok(event) = rx.try_recv() {
            if Instant::now() >= deadline {
                discarded += 1;
                break;
            }
            let event_id = event.id();
            if tokio::time::timeout_at(deadline, self.handle_event(event))
                .await
                .is_err()
            {
                warn!(event_id, "drain grace elapsed while handling event");
                discarded += 1;
                break;
            }
        }

        rx.close();
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            self.queue.record_discarded(discarded);
        }
    }

    async fn handle_event(&mut self, event: NormalizedEvent) {
        Counters::bump(&self.stats.handled);
        let event_id = event.id();
        let kind = event.kind();
        let second_pass = self.deferred.remove(&event_id);

        // Keep per-user order: nothing from a user overtakes their deferred event.
        if second_pass {
            if let Some(user_id) = event.user_id() {
                self.waiting.remove(user_id);
            }
        } else if event.user_id().is_some_and(|user_id| self.waiting.contains(user_id))
            && self.hold(&event)
        {
            return;
        }

        let state = match self.state_before(&event).await {
            Ok(state) => state,
            Err(e) => {
                error!(event_id, %kind, error = %e, "could not load user state, dropping event");
                Counters::bump(&self.stats.errors);
                return;
            }
        };

        let now = timestamp_ms();
        let decision = self.engine.decide_at(&event, &state, now, &mut self.rng);
        debug!(
            event_id,
            %kind,
            user = %state.name(),
            last_seen = %time_since(state.last_seen, now),
            content = %truncate_str(event.content().unwrap_or_default(), 60),
            %decision,
            "decided"
        );

        // A deferred event was already applied on its first pass.
        if !second_pass {
            self.apply(&event, now).await;
        }

        match (decision.action, decision.category) {
            (Action::Respond, Some(category)) => {
                self.execute(category, decision.delay, &event, &state).await;
            }
            (Action::Defer, _) if !second_pass => self.defer(event),
            _ => Counters::bump(&self.stats.ignored),
        }
    }

    async fn state_before(&self, event: &NormalizedEvent) -> StorageResult<UserState> {
        match event.user_id() {
            Some(user_id) => self.store.get(user_id).await,
            None => Ok(UserState::new(event.channel())),
        }
    }

    async fn apply(&self, event: &NormalizedEvent, now_ms: u64) {
        let Some(user_id) = event.user_id() else {
            return;
        };
        let result = match event.kind() {
            EventKind::ChatMessage => self.apply_chat(user_id, event, now_ms).await,
            EventKind::Idle => Ok(()),
            _ => self.store.touch_seen(event).await.map(drop),
        };
        if let Err(e) = result {
            warn!(event_id = event.id(), user_id, error = %e, "profile update not persisted");
            Counters::bump(&self.stats.errors);
        }
    }

    async fn apply_chat(&self, user_id: &str, event: &NormalizedEvent, now_ms: u64) -> StorageResult<()> {
        self.store.touch_message(user_id).await?;

        let analyzer = &self.analyzer;
        let insights = analyzer.analyze(event.content().unwrap_or_default());
        self.store
            .upsert(user_id, |state| {
                state.record_seen(event, now_ms);
                analyzer.apply(state, &insights);
            })
            .await?;
        Ok(())
    }

    async fn execute(
        &mut self,
        category: ResponseCategory,
        delay: Duration,
        event: &NormalizedEvent,
        state: &UserState,
    ) {
        let event_id = event.id();
        let Some(text) = self.composer.compose(category, event, state, &mut self.rng) else {
            debug!(event_id, %category, "no template, nothing sent");
            Counters::bump(&self.stats.ignored);
            return;
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let message = OutboundMessage::reply_to(event, text);
        if let Err(e) = self.chat.send(&message).await {
            warn!(event_id, connection = %self.chat.name(), error = %e, "send failed");
            Counters::bump(&self.stats.send_failures);
            return;
        }
        Counters::bump(&self.stats.responded);
        info!(event_id, %category, user = %state.name(), ?delay, "responded");

        if let Some(user_id) = event.user_id() {
            let at = timestamp_ms();
            if let Err(e) = self
                .store
                .upsert(user_id, |s| s.last_response_at = Some(at))
                .await
            {
                warn!(event_id, user_id, error = %e, "last response time not persisted");
                Counters::bump(&self.stats.errors);
            }
        }
    }

    fn defer(&mut self, event: NormalizedEvent) {
        let event_id = event.id();
        let user_id = event.user_id().map(str::to_string);
        match self.queue.requeue(event) {
            Ok(()) => {
                self.deferred.insert(event_id);
                self.waiting.extend(user_id);
                Counters::bump(&self.stats.deferred);
                debug!(event_id, "deferred to queue tail");
            }
            Err(e) => {
                debug!(event_id, error = %e, "could not defer, ignoring");
                Counters::bump(&self.stats.ignored);
            }
        }
    }

    /// Put `event` back behind its user's deferred event. Returns `false`
    /// when the queue refuses it; the caller then handles it right away.
    fn hold(&self, event: &NormalizedEvent) -> bool {
        let event_id = event.id();
        match self.queue.requeue(event.clone()) {
            Ok(()) => {
                Counters::bump(&self.stats.held);
                debug!(event_id, "held behind deferred event");
                true
            }
            Err(e) => {
                debug!(event_id, error = %e, "could not hold, handling now");
                false
            }
        }
    }
}

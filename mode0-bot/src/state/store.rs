//! The user state store.
//!
//! Each user gets its own slot behind a synchronous mutex. A mutation runs
//! entirely inside that mutex and never awaits; before the mutex is released
//! the new snapshot is handed to a single writer task, so writes reach the
//! backend in mutation order. [`UserStateStore::upsert`] then waits for the
//! writer's acknowledgement.

use super::profile::UserState;
use super::retry::RetryPolicy;
use super::storage::ProfileStorage;
use crate::error::{StorageError, StorageResult};
use crate::events::NormalizedEvent;
use crate::util::timestamp_ms;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type Slot = Arc<Mutex<UserState>>;

enum WriterMsg {
    Write {
        user_id: String,
        state: UserState,
        ack: oneshot::Sender<StorageResult<()>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Store statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Users currently cached in memory.
    pub cached_users: usize,
    /// Profile writes that reached the backend.
    pub writes: u64,
    /// Profile writes given up after the retry budget.
    pub abandoned_writes: u64,
}

#[derive(Debug, Default)]
struct WriterStats {
    writes: AtomicU64,
    abandoned: AtomicU64,
}

/// Async-safe owner of every [`UserState`].
pub struct UserStateStore {
    slots: Mutex<HashMap<String, Slot>>,
    storage: Arc<dyn ProfileStorage>,
    writer: mpsc::UnboundedSender<WriterMsg>,
    retry: RetryPolicy,
    stats: Arc<WriterStats>,
}

impl std::fmt::Debug for UserStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStateStore")
            .field("backend", &self.storage.name())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking mutator leaves the state as it was at the panic; keep going.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl UserStateStore {
    /// Create a store over `storage` and spawn its writer task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(storage: Arc<dyn ProfileStorage>, retry: RetryPolicy) -> Self {
        let (writer, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(WriterStats::default());
        tokio::spawn(run_writer(Arc::clone(&storage), retry, rx, Arc::clone(&stats)));
        info!(backend = storage.name(), "user state store ready");

        Self {
            slots: Mutex::new(HashMap::new()),
            storage,
            writer,
            retry,
            stats,
        }
    }

    /// Current state of `user_id`, or a fresh default if never seen.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidKey`] for a blank id; the backend's error if it
    /// stays unavailable through the retry budget.
    pub async fn get(&self, user_id: &str) -> StorageResult<UserState> {
        let slot = self.slot(user_id).await?;
        let state = lock(&slot).clone();
        Ok(state)
    }

    /// Apply `mutator` to the user's state atomically and persist the result.
    ///
    /// Upserts on the same user serialize; different users never contend.
    /// Returns the state as committed by this call.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the write is abandoned. The mutation
    /// stays applied in memory and is persisted by the next successful write.
    pub async fn upsert<F>(&self, user_id: &str, mutator: F) -> StorageResult<UserState>
    where
        F: FnOnce(&mut UserState),
    {
        let slot = self.slot(user_id).await?;

        let (committed, ack) = {
            let mut state = lock(&slot);
            mutator(&mut state);
            let committed = state.clone();
            let (ack_tx, ack_rx) = oneshot::channel();
            self.writer
                .send(WriterMsg::Write {
                    user_id: user_id.to_string(),
                    state: committed.clone(),
                    ack: ack_tx,
                })
                .map_err(|_| StorageError::WriterStopped)?;
            (committed, ack_rx)
        };

        match ack.await {
            Ok(Ok(())) => Ok(committed),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StorageError::WriterStopped),
        }
    }

    /// Count one chat message from `user_id` and refresh `last_seen`.
    ///
    /// # Errors
    ///
    /// Same as [`upsert`](Self::upsert).
    pub async fn touch_message(&self, user_id: &str) -> StorageResult<UserState> {
        self.upsert(user_id, |state| state.record_message(timestamp_ms()))
            .await
    }

    /// Record that `event` referenced its user, creating the record if needed.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidKey`] if the event has no user; otherwise same
    /// as [`upsert`](Self::upsert).
    pub async fn touch_seen(&self, event: &NormalizedEvent) -> StorageResult<UserState> {
        let user_id = event
            .user_id()
            .ok_or_else(|| StorageError::InvalidKey(String::new()))?;
        self.upsert(user_id, |state| state.record_seen(event, timestamp_ms()))
            .await
    }

    /// Wait until every write queued so far has been handled.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriterMsg::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            cached_users: lock(&self.slots).len(),
            writes: self.stats.writes.load(Ordering::Relaxed),
            abandoned_writes: self.stats.abandoned.load(Ordering::Relaxed),
        }
    }

    /// Find or load the slot for `user_id`. The map lock is never held
    /// across the backend load.
    async fn slot(&self, user_id: &str) -> StorageResult<Slot> {
        if user_id.trim().is_empty() {
            return Err(StorageError::InvalidKey(user_id.to_string()));
        }
        if let Some(slot) = lock(&self.slots).get(user_id) {
            return Ok(Arc::clone(slot));
        }

        let loaded = self
            .retry
            .run("load_profile", || self.storage.load_profile(user_id))
            .await?;
        let state = match loaded {
            Some(blob) => {
                let mut state = UserState::from_blob(&blob)?;
                if state.user_id != user_id {
                    warn!(user_id, stored = %state.user_id, "profile stored under another id, rekeying");
                    state.user_id = user_id.to_string();
                }
                debug!(user_id, "loaded profile");
                state
            }
            None => UserState::new(user_id),
        };

        // Another task may have loaded the same user meanwhile; first one wins.
        let slot = lock(&self.slots)
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(state)))
            .clone();
        Ok(slot)
    }
}

async fn run_writer(
    storage: Arc<dyn ProfileStorage>,
    retry: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<WriterMsg>,
    stats: Arc<WriterStats>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Write { user_id, state, ack } => {
                let result = match state.to_blob() {
                    Ok(blob) => {
                        retry
                            .run("save_profile", || storage.save_profile(&user_id, &blob))
                            .await
                    }
                    Err(e) => Err(e),
                };
                match &result {
                    Ok(()) => {
                        stats.writes.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.abandoned.fetch_add(1, Ordering::Relaxed);
                        error!(user_id = %user_id, error = %e, "abandoning profile write");
                    }
                }
                let _ = ack.send(result);
            }
            WriterMsg::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("profile writer stopped");
}

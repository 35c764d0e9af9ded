//! Wires the whole pipeline together.
//!
//! ```text
//! ChatConnection ─┐
//!                 ├─> EventIngress ─> EventQueue ─> Dispatcher ─> ChatConnection::send
//! IdleScheduler ──┘                                    │
//!                                                UserStateStore ─> ProfileStorage
//! ```

use crate::chat::{ChatConnection, ConnectionStatus};
use crate::config::BotConfig;
use crate::dispatcher::{Dispatcher, DispatcherHandle, DispatcherStats};
use crate::error::Result;
use crate::idle::{ActivityTracker, IdleHandle, IdleScheduler, IdleSettings, IdleStatus};
use crate::ingress::EventIngress;
use crate::normalizer::EventNormalizer;
use crate::queue::{EventQueue, QueueStats};
use crate::state::{ProfileStorage, RetryPolicy, StoreStats, UserStateStore, open_storage};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Snapshot of every pipeline stage.
#[derive(Debug, Clone)]
pub struct BotStatus {
    /// Chat connection.
    pub connection: ConnectionStatus,
    /// Event queue counters.
    pub queue: QueueStats,
    /// Dispatcher counters.
    pub dispatcher: DispatcherStats,
    /// User state store counters.
    pub store: StoreStats,
    /// Idle scheduler, when enabled.
    pub idle: Option<IdleStatus>,
}

/// A configured, not yet running bot.
pub struct Bot {
    config: BotConfig,
    chat: Arc<dyn ChatConnection>,
    normalizer: Arc<EventNormalizer>,
    queue: EventQueue,
    activity: ActivityTracker,
    store: Arc<UserStateStore>,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.config.bot.name)
            .field("chat", &self.chat.name())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Bot {
    /// Build a bot over the storage backend named in `config`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration or if the storage backend cannot be
    /// opened. Both are fatal.
    pub async fn new(config: BotConfig, chat: Arc<dyn ChatConnection>) -> Result<Self> {
        config.ensure_valid()?;
        let storage = open_storage(&config.database).await?;
        match storage.list_profiles().await {
            Ok(ids) => info!(backend = storage.name(), profiles = ids.len(), "profile storage opened"),
            Err(e) => warn!(backend = storage.name(), error = %e, "profile storage opened, profiles not listed"),
        }
        Self::with_storage(config, storage, chat)
    }

    /// Build a bot over an already opened storage backend.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration.
    pub fn with_storage(
        config: BotConfig,
        storage: Arc<dyn ProfileStorage>,
        chat: Arc<dyn ChatConnection>,
    ) -> Result<Self> {
        config.ensure_valid()?;
        for issue in config.validate() {
            warn!(%issue, "configuration warning");
        }

        let store = UserStateStore::new(storage, RetryPolicy::from(&config.storage_retry));
        Ok(Self {
            queue: EventQueue::with_capacity(config.queue.capacity),
            normalizer: Arc::new(EventNormalizer::new()),
            activity: ActivityTracker::new(),
            store: Arc::new(store),
            chat,
            config,
        })
    }

    /// Producer handle for pushing raw events.
    #[must_use]
    pub fn ingress(&self) -> EventIngress {
        EventIngress::new(
            Arc::clone(&self.normalizer),
            self.queue.clone(),
            self.activity.clone(),
        )
    }

    /// The user state store.
    #[must_use]
    pub const fn store(&self) -> &Arc<UserStateStore> {
        &self.store
    }

    /// Start the dispatcher, the idle scheduler (if `bot.auto_engage`) and
    /// the chat connection.
    ///
    /// # Errors
    ///
    /// Fails if the chat connection cannot start; nothing keeps running in
    /// that case.
    pub async fn start(self) -> Result<RunningBot> {
        let dispatcher = Dispatcher::from_config(
            &self.config,
            self.queue.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.chat),
        )
        .start()?;

        let idle = self.config.bot.auto_engage.then(|| {
            IdleScheduler::new(
                IdleSettings {
                    interval: self.config.idle_interval(),
                    cooldown: self.config.idle_cooldown(),
                    channel: self.config.channel().to_string(),
                },
                Arc::clone(&self.normalizer),
                self.queue.clone(),
                self.activity.clone(),
            )
            .start()
        });

        let running = RunningBot {
            chat: Arc::clone(&self.chat),
            ingress: self.ingress(),
            queue: self.queue,
            store: self.store,
            dispatcher,
            idle,
        };

        if let Err(e) = running.chat.start(running.ingress.clone()).await {
            error!(connection = %running.chat.name(), error = %e, "chat connection failed to start");
            running.shutdown().await?;
            return Err(e.into());
        }

        info!(
            bot = %self.config.bot.name,
            channel = %self.config.channel(),
            connection = %running.chat.name(),
            "bot started"
        );
        Ok(running)
    }

    /// Start, run until Ctrl+C, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Startup failures and signal handler errors.
    pub async fn run(self) -> Result<()> {
        let running = self.start().await?;
        tokio::signal::ctrl_c().await?;
        info!("shutdown requested");
        let status = running.shutdown().await?;
        info!(
            responded = status.dispatcher.responded,
            discarded = status.queue.discarded,
            "bot stopped"
        );
        Ok(())
    }
}

/// A running bot.
pub struct RunningBot {
    chat: Arc<dyn ChatConnection>,
    ingress: EventIngress,
    queue: EventQueue,
    store: Arc<UserStateStore>,
    dispatcher: DispatcherHandle,
    idle: Option<IdleHandle>,
}

impl std::fmt::Debug for RunningBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningBot")
            .field("chat", &self.chat.name())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl RunningBot {
    /// Producer handle for pushing raw events.
    #[must_use]
    pub fn ingress(&self) -> EventIngress {
        self.ingress.clone()
    }

    /// Current status of every stage.
    pub async fn status(&self) -> BotStatus {
        let idle = match &self.idle {
            Some(handle) => Some(handle.status().await),
            None => None,
        };
        BotStatus {
            connection: self.chat.status().await,
            queue: self.queue.stats(),
            dispatcher: self.dispatcher.stats(),
            store: self.store.stats(),
            idle,
        }
    }

    /// Stop in pipeline order: refuse new events, stop the scheduler, let
    /// the dispatcher drain, disconnect, flush pending profile writes.
    ///
    /// The connection is stopped and the store flushed even when the
    /// dispatcher failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher task panicked.
    pub async fn shutdown(self) -> Result<BotStatus> {
        self.queue.close();

        let idle = match self.idle {
            Some(handle) => {
                let status = handle.status().await;
                handle.stop().await;
                Some(status)
            }
            None => None,
        };

        let joined = self.dispatcher.join().await;
        if let Err(e) = &joined {
            error!(error = %e, "dispatcher did not finish cleanly");
        }

        if let Err(e) = self.chat.stop().await {
            warn!(connection = %self.chat.name(), error = %e, "chat connection did not stop cleanly");
        }
        self.store.flush().await;

        Ok(BotStatus {
            connection: self.chat.status().await,
            queue: self.queue.stats(),
            dispatcher: joined?,
            store: self.store.stats(),
            idle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ConnectionState, RecordingChat};
    use crate::config::{Rate, StorageBackend};
    use crate::error::{BotError, ChannelResult};
    use crate::events::{OutboundMessage, RawEvent};
    use crate::state::MemoryProfileStorage;
    use async_trait::async_trait;

    /// Delegates to a recording connection but panics on every send.
    #[derive(Debug)]
    struct PanickingChat {
        inner: RecordingChat,
    }

    #[async_trait]
    impl ChatConnection for PanickingChat {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn start(&self, ingress: EventIngress) -> ChannelResult<()> {
            self.inner.start(ingress).await
        }

        async fn stop(&self) -> ChannelResult<()> {
            self.inner.stop().await
        }

        async fn send(&self, _msg: &OutboundMessage) -> ChannelResult<()> {
            panic!("send exploded");
        }

        async fn status(&self) -> ConnectionStatus {
            self.inner.status().await
        }
    }

    fn config() -> BotConfig {
        let mut config = BotConfig::default();
        config.twitch.channel = "qwazi905".to_string();
        config.engagement.direct_question_rate = Rate::ALWAYS;
        config.engagement.seed = Some(11);
        config
    }

    fn bot(config: BotConfig, chat: &Arc<RecordingChat>) -> Bot {
        let chat: Arc<dyn ChatConnection> = Arc::<RecordingChat>::clone(chat);
        Bot::with_storage(config, Arc::new(MemoryProfileStorage::new()), chat).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_reply_and_shutdown() {
        let chat = Arc::new(RecordingChat::new());
        let running = bot(config(), &chat).start().await.unwrap();
        assert!(chat.is_running().await);

        let outcome = running
            .ingress()
            .push(RawEvent::chat("qwazi905", "42", "Alice", "is the stream live?"));
        assert!(outcome.is_queued());

        let status = running.shutdown().await.unwrap();
        assert_eq!(status.dispatcher.responded, 1);
        assert_eq!(status.queue.accepted, 1);
        assert_eq!(status.connection.state, ConnectionState::Stopped);
        assert!(status.idle.is_some());

        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, "qwazi905");
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_after_shutdown_are_rejected() {
        let chat = Arc::new(RecordingChat::new());
        let mut config = config();
        config.bot.auto_engage = false;
        let running = bot(config, &chat).start().await.unwrap();
        let ingress = running.ingress();

        let status = running.shutdown().await.unwrap();
        assert!(status.idle.is_none());
        assert!(!ingress.push(RawEvent::chat("qwazi905", "42", "Alice", "hello?")).is_queued());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_completes_after_dispatcher_failure() {
        let chat = Arc::new(PanickingChat {
            inner: RecordingChat::new(),
        });
        let storage = Arc::new(MemoryProfileStorage::new());
        let mut config = config();
        config.bot.auto_engage = false;

        let dyn_chat: Arc<dyn ChatConnection> = Arc::<PanickingChat>::clone(&chat);
        let running = Bot::with_storage(config, Arc::<MemoryProfileStorage>::clone(&storage), dyn_chat)
            .unwrap()
            .start()
            .await
            .unwrap();
        assert!(running
            .ingress()
            .push(RawEvent::chat("qwazi905", "42", "Alice", "is the stream live?"))
            .is_queued());

        let err = running.shutdown().await.unwrap_err();
        assert!(matches!(err, BotError::Task(_)));

        // The connection is still stopped and the profile write flushed.
        assert_eq!(chat.status().await.state, ConnectionState::Stopped);
        assert!(storage.load_profile("42").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let mut config = config();
        config.response_timing.min_delay = -1.0;
        let chat: Arc<dyn ChatConnection> = Arc::new(RecordingChat::new());
        let err = Bot::with_storage(config, Arc::new(MemoryProfileStorage::new()), chat).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_new_opens_existing_file_storage() {
        let dir = std::env::temp_dir().join(format!(
            "mode0-bot-new-{}-{}",
            std::process::id(),
            crate::util::timestamp_ms()
        ));
        let existing = crate::state::FileProfileStorage::open(&dir).await.unwrap();
        existing
            .save_profile("42", r#"{"user_id":"42","message_count":4}"#)
            .await
            .unwrap();

        let mut config = config();
        config.database.backend = StorageBackend::File;
        config.database.path = Some(dir.clone());
        let chat: Arc<dyn ChatConnection> = Arc::new(RecordingChat::new());
        let bot = Bot::new(config, chat).await.unwrap();
        assert_eq!(bot.store().get("42").await.unwrap().message_count, 4);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_storage_init_failure_is_fatal() {
        let mut config = config();
        config.database.backend = StorageBackend::File;
        config.database.path = Some("/proc/mode0-cannot-create/profiles".into());
        let chat: Arc<dyn ChatConnection> = Arc::new(RecordingChat::new());
        let err = Bot::new(config, chat).await.unwrap_err();
        assert!(err.is_fatal());
    }
}

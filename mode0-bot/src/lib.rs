//! Mode_0 - a Twitch chat bot's event pipeline.
//!
//! Chat messages and platform events (follows, subscriptions, tips, raids,
//! redemptions) flow through one ordered pipeline that decides whether and
//! how the bot answers, remembers every viewer, and starts conversations
//! when the channel goes quiet.
//!
//! # Architecture
//!
//! - **Ingress** ([`ingress`], [`normalizer`]) - validate raw events and queue them
//! - **Queue** ([`queue`]) - bounded FIFO between producers and the dispatcher
//! - **Dispatcher** ([`dispatcher`]) - single consumer: state, decision, reply
//! - **Decisions** ([`decision`]) - pure, seeded rules and chat commands
//! - **Persona** ([`persona`]) - response templates and profile inference
//! - **State** ([`state`]) - per-user profiles and their storage backends
//! - **Idle** ([`idle`]) - injects idle events after a quiet period
//! - **Connections** ([`chat`], [`channels`]) - where events come from and replies go
//! - **Bot** ([`bot`]) - wires everything together
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mode0_bot::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = load_config().await?;
//!     let chat = Arc::new(ConsoleChat::new(config.channel(), config.bot.name.clone()));
//!     Bot::new(config, chat).await?.run().await
//! }
//! ```

pub mod bot;
pub mod channels;
pub mod chat;
pub mod config;
pub mod decision;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod idle;
pub mod ingress;
pub mod normalizer;
pub mod persona;
pub mod queue;
pub mod state;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error types
    pub use crate::error::{
        BotError, ChannelError, ChannelResult, ConfigError, ConfigResult, EventError, EventResult,
        QueueError, QueueResult, Result, StorageError, StorageResult,
    };

    // Bot
    pub use crate::bot::{Bot, BotStatus, RunningBot};

    // Connections
    pub use crate::channels::ConsoleChat;
    pub use crate::chat::{
        ChatConnection, ConnectionBase, ConnectionState, ConnectionStatus, RecordingChat,
    };

    // Config
    pub use crate::config::{
        BotConfig, ConfigIssue, IssueLevel, Rate, StorageBackend, config_path, init_config,
        load_config, load_config_from, save_config,
    };

    // Pipeline
    pub use crate::decision::{
        Action, CommandHandler, CommandRegistry, DecisionEngine, DecisionResult, DecisionSettings,
        ResponseCategory,
    };
    pub use crate::dispatcher::{Dispatcher, DispatcherHandle, DispatcherStats};
    pub use crate::events::{EventKind, NormalizedEvent, OutboundMessage, RawEvent};
    pub use crate::idle::{ActivityTracker, IdleHandle, IdleScheduler, IdleSettings, IdleStatus};
    pub use crate::ingress::{EventIngress, IngressOutcome};
    pub use crate::normalizer::EventNormalizer;
    pub use crate::queue::{EventQueue, QueueStats};

    // Persona and state
    pub use crate::persona::{ProfileAnalyzer, ResponseComposer, ResponseTemplates};
    pub use crate::state::{
        FileProfileStorage, MemoryProfileStorage, ProfileStorage, SqliteProfileStorage, UserState,
        UserStateStore,
    };

    // Utilities
    pub use crate::util::{format_duration, time_since, timestamp_ms};
}

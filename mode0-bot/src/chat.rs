//! Chat connection trait and shared connection bookkeeping.
//!
//! A connection pushes whatever it receives into an [`EventIngress`] and
//! is called back only to deliver outbound text.

use crate::error::{ChannelError, ChannelResult};
use crate::events::OutboundMessage;
use crate::ingress::EventIngress;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not started.
    #[default]
    Stopped,
    /// Starting up.
    Starting,
    /// Connected and delivering events.
    Running,
    /// Shutting down.
    Stopping,
    /// Failed.
    Error,
}

/// Connection status snapshot.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    /// Connection name.
    pub name: String,
    /// Current state.
    pub state: ConnectionState,
    /// Raw events pushed into ingress.
    pub events_received: u64,
    /// Messages delivered to chat.
    pub messages_sent: u64,
    /// Last error message, if any.
    pub last_error: Option<String>,
    /// Running with no recorded error.
    pub healthy: bool,
}

/// A chat platform connection.
#[async_trait]
pub trait ChatConnection: Send + Sync {
    /// Unique connection name.
    fn name(&self) -> &str;

    /// Connect and start pushing inbound events into `ingress`.
    async fn start(&self, ingress: EventIngress) -> ChannelResult<()>;

    /// Disconnect and release resources.
    async fn stop(&self) -> ChannelResult<()>;

    /// Deliver one outbound message.
    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()>;

    /// Current status.
    async fn status(&self) -> ConnectionStatus;

    /// Whether the connection is running.
    async fn is_running(&self) -> bool {
        self.status().await.state == ConnectionState::Running
    }
}

/// State and counters most connections need.
pub struct ConnectionBase {
    name: String,
    state: RwLock<ConnectionState>,
    stats: RwLock<ConnectionStats>,
}

impl std::fmt::Debug for ConnectionBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionBase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ConnectionStats {
    events_received: u64,
    messages_sent: u64,
    last_error: Option<String>,
}

impl ConnectionBase {
    /// Create a stopped base.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ConnectionState::default()),
            stats: RwLock::new(ConnectionStats::default()),
        }
    }

    /// Connection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Set the state.
    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
        debug!(connection = %self.name, ?state, "connection state changed");
    }

    /// Fail unless running.
    pub async fn ensure_running(&self) -> ChannelResult<()> {
        if self.state().await == ConnectionState::Running {
            Ok(())
        } else {
            Err(ChannelError::NotConnected)
        }
    }

    /// Record an inbound event.
    pub async fn record_received(&self) {
        self.stats.write().await.events_received += 1;
    }

    /// Record a delivered message.
    pub async fn record_sent(&self) {
        self.stats.write().await.messages_sent += 1;
    }

    /// Record an error.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(connection = %self.name, %error, "connection error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Build a status snapshot.
    pub async fn build_status(&self) -> ConnectionStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;

        ConnectionStatus {
            name: self.name.clone(),
            state,
            events_received: stats.events_received,
            messages_sent: stats.messages_sent,
            last_error: stats.last_error.clone(),
            healthy: state == ConnectionState::Running && stats.last_error.is_none(),
        }
    }
}

// ============================================================================
// Recording connection
// ============================================================================

/// In-process connection that keeps every delivered message.
///
/// Useful for embedding the pipeline and for tests; inbound events are
/// injected through the [`EventIngress`] handed to [`start`](ChatConnection::start).
#[derive(Debug)]
pub struct RecordingChat {
    base: ConnectionBase,
    sent: Mutex<Vec<OutboundMessage>>,
    fail_sends: Mutex<bool>,
}

impl RecordingChat {
    /// Create a stopped recording connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: ConnectionBase::new("recording"),
            sent: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(false),
        }
    }

    /// Messages delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        *self
            .fail_sends
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = fail;
    }
}

impl Default for RecordingChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatConnection for RecordingChat {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, _ingress: EventIngress) -> ChannelResult<()> {
        self.base.set_state(ConnectionState::Running).await;
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ConnectionState::Stopped).await;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        let failing = *self
            .fail_sends
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if failing {
            self.base.record_error("send refused").await;
            return Err(ChannelError::send("send refused"));
        }
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(msg.clone());
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ConnectionStatus {
        self.base.build_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_base() {
        let base = ConnectionBase::new("test");
        assert_eq!(base.name(), "test");
        assert_eq!(base.state().await, ConnectionState::Stopped);
        assert!(matches!(base.ensure_running().await, Err(ChannelError::NotConnected)));

        base.set_state(ConnectionState::Running).await;
        base.record_received().await;
        base.record_sent().await;

        let status = base.build_status().await;
        assert_eq!(status.events_received, 1);
        assert_eq!(status.messages_sent, 1);
        assert!(status.healthy);

        base.record_error("boom").await;
        assert!(!base.build_status().await.healthy);
    }

    #[tokio::test]
    async fn test_recording_chat() {
        let chat = RecordingChat::new();
        let msg = OutboundMessage {
            channel: "c".into(),
            content: "hi".into(),
            in_reply_to: 1,
        };
        chat.send(&msg).await.unwrap();

        chat.fail_sends(true);
        assert!(chat.send(&msg).await.is_err());

        assert_eq!(chat.sent(), vec![msg]);
        assert_eq!(chat.status().await.messages_sent, 1);
    }
}

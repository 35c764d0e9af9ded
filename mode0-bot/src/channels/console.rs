//! Console chat connection.
//!
//! Reads stdin line by line and writes the bot's messages to stdout, which
//! is enough to drive the whole pipeline locally:
//!
//! ```text
//! alice: hey everyone
//! are you there mode_0?
//! {"type": "tip-latest", "username": "BigFan", "data": {"amount": "$5"}}
//! ```
//!
//! `name: text` chats as `name`; any other line chats as `console`; lines
//! starting with `{` are platform events in JSON.

use crate::chat::{ChatConnection, ConnectionBase, ConnectionState, ConnectionStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{OutboundMessage, RawEvent};
use crate::ingress::EventIngress;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

const CONSOLE_USER: &str = "console";

/// Parse one console line into a raw event for `channel`.
///
/// Returns `None` for blank lines and unparseable JSON.
#[must_use]
pub fn parse_line(line: &str, channel: &str) -> Option<RawEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.starts_with('{') {
        let mut raw: RawEvent = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "ignoring malformed event line");
                return None;
            }
        };
        if raw.channel.is_none() {
            raw.channel = Some(channel.to_string());
        }
        return Some(raw);
    }

    let (name, text) = match line.split_once(':') {
        Some((name, text))
            if !name.is_empty() && !name.contains(char::is_whitespace) && !text.trim().is_empty() =>
        {
            (name, text.trim())
        }
        _ => (CONSOLE_USER, line),
    };
    Some(RawEvent::chat(channel, name.to_lowercase(), name, text))
}

/// Push every line of `reader` into `ingress` until EOF, a read error or
/// shutdown. A read error leaves the connection in [`ConnectionState::Error`].
async fn read_lines<R>(
    reader: R,
    channel: String,
    ingress: EventIngress,
    base: Arc<ConnectionBase>,
    mut shutdown_rx: mpsc::Receiver<()>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(raw) = parse_line(&line, &channel) {
                        base.record_received().await;
                        ingress.push(raw);
                    }
                }
                Ok(None) => {
                    info!("console input closed");
                    break;
                }
                Err(e) => {
                    base.record_error(format!("console read failed: {e}")).await;
                    base.set_state(ConnectionState::Error).await;
                    break;
                }
            },
            _ = shutdown_rx.recv() => {
                debug!("console reader shutting down");
                break;
            }
        }
    }
}

/// stdin/stdout chat connection.
#[derive(Debug)]
pub struct ConsoleChat {
    base: Arc<ConnectionBase>,
    channel: String,
    speaker: String,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
}

impl ConsoleChat {
    /// Console connection posing as `channel`, printing replies as `speaker`.
    #[must_use]
    pub fn new(channel: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self {
            base: Arc::new(ConnectionBase::new("console")),
            channel: channel.into(),
            speaker: speaker.into(),
            shutdown_tx: RwLock::new(None),
        }
    }
}

#[async_trait]
impl ChatConnection for ConsoleChat {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, ingress: EventIngress) -> ChannelResult<()> {
        let mut slot = self.shutdown_tx.write().await;
        if slot.is_some() {
            return Err(ChannelError::start("console already running"));
        }
        self.base.set_state(ConnectionState::Starting).await;

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        *slot = Some(shutdown_tx);
        drop(slot);

        self.base.set_state(ConnectionState::Running).await;
        tokio::spawn(read_lines(
            BufReader::new(tokio::io::stdin()),
            self.channel.clone(),
            ingress,
            Arc::clone(&self.base),
            shutdown_rx,
        ));
        info!(channel = %self.channel, "console connection started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ConnectionState::Stopping).await;

        let tx = self.shutdown_tx.write().await.take();
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }

        self.base.set_state(ConnectionState::Stopped).await;
        info!("console connection stopped");
        Ok(())
    }

    #[allow(clippy::print_stdout)]
    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        self.base.ensure_running().await?;
        println!("{}: {}", self.speaker, msg.content);
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
    use crate::idle::ActivityTracker;
    use crate::normalizer::EventNormalizer;
    use crate::queue::EventQueue;

    #[test]
    fn test_parse_named_chat() {
        let raw = parse_line("Alice: hey everyone", "qwazi").unwrap();
        assert_eq!(raw.kind.as_deref(), Some("chat_message"));
        assert_eq!(raw.user_id.as_deref(), Some("alice"));
        assert_eq!(raw.display_name.as_deref(), Some("Alice"));
        assert_eq!(raw.content.as_deref(), Some("hey everyone"));
        assert_eq!(raw.channel.as_deref(), Some("qwazi"));
    }

    #[test]
    fn test_parse_anonymous_chat() {
        let raw = parse_line("what time is it: now?", "qwazi").unwrap();
        assert_eq!(raw.user_id.as_deref(), Some("console"));
        assert_eq!(raw.content.as_deref(), Some("what time is it: now?"));

        assert!(parse_line("   ", "qwazi").is_none());
    }

    #[test]
    fn test_parse_json_event() {
        let raw = parse_line(r#"{"type": "tip-latest", "username": "BigFan", "data": {"amount": 5}}"#, "qwazi")
            .unwrap();
        assert_eq!(raw.kind.as_deref(), Some("tip-latest"));
        assert_eq!(raw.channel.as_deref(), Some("qwazi"));
        assert_eq!(raw.data["amount"], 5);

        assert!(parse_line("{not json", "qwazi").is_none());
    }

    #[tokio::test]
    async fn test_send_requires_running() {
        let console = ConsoleChat::new("qwazi", "Mode_0");
        let msg = OutboundMessage {
            channel: "qwazi".into(),
            content: "hi".into(),
            in_reply_to: 1,
        };
        assert!(matches!(console.send(&msg).await, Err(ChannelError::NotConnected)));
        assert_eq!(console.status().await.state, ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_reader_counts_lines_and_flags_read_errors() {
        let queue = EventQueue::with_capacity(8);
        let ingress = EventIngress::new(
            Arc::new(EventNormalizer::new()),
            queue.clone(),
            ActivityTracker::new(),
        );
        let base = Arc::new(ConnectionBase::new("console"));
        base.set_state(ConnectionState::Running).await;
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);

        // Blank line skipped; invalid UTF-8 fails the read.
        let input: &[u8] = b"alice: hi there\n\nbob: anyone here?\n\xff\xfe\ncarol: too late\n";
        read_lines(input, "qwazi".into(), ingress, Arc::clone(&base), shutdown_rx).await;

        let status = base.build_status().await;
        assert_eq!(status.events_received, 2);
        assert_eq!(status.state, ConnectionState::Error);
        assert!(status.last_error.is_some_and(|e| e.contains("console read failed")));
        assert!(!status.healthy);
        assert_eq!(queue.len(), 2);
    }
}

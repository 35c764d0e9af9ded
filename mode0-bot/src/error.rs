//! Unified error types for mode0-bot.
//!
//! Every pipeline stage has its own error enum so callers can match on the
//! failure class that matters to them (drop a malformed event, retry a
//! storage outage, log a saturated queue). All of them convert into
//! [`BotError`] for the binary and the startup path.

use std::fmt;

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for mode0-bot operations.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Inbound event could not be normalized.
    #[error("event: {0}")]
    Event(#[from] EventError),

    /// Event queue error.
    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    /// Chat connection error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Profile storage error.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Task join error.
    #[error("task: {0}")]
    Task(String),
}

impl BotError {
    /// Create a config error from a string.
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }

    /// Whether this error must stop the process.
    ///
    /// Only startup-time configuration problems and storage initialization
    /// failures are fatal; everything else is contained to one event.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Storage(StorageError::Init { .. }))
    }
}

impl From<tokio::task::JoinError> for BotError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type alias for mode0-bot operations.
pub type Result<T> = std::result::Result<T, BotError>;

// ============================================================================
// Event Errors
// ============================================================================

/// Error raised while normalizing a raw inbound event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// A required envelope field is absent or blank.
    #[error("malformed event: missing {0}")]
    MissingField(&'static str),

    /// The kind tag is not one the pipeline understands.
    #[error("malformed event: unknown kind `{0}`")]
    UnknownKind(String),
}

impl EventError {
    /// Whether this error means the event is malformed and must be dropped.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::UnknownKind(_))
    }
}

/// Result type for event normalization.
pub type EventResult<T> = std::result::Result<T, EventError>;

// ============================================================================
// Queue Errors
// ============================================================================

/// Error type for event queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue is at capacity; the event was rejected, not buffered.
    #[error("queue saturated (capacity {capacity})")]
    Saturated {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The queue no longer accepts events (shutdown in progress).
    #[error("queue closed")]
    Closed,

    /// The consumer side was already taken by a dispatcher.
    #[error("queue receiver already taken")]
    ReceiverTaken,
}

/// Result type for queue operations.
pub type QueueResult<T> = std::result::Result<T, QueueError>;

// ============================================================================
// Channel Errors
// ============================================================================

/// Error type for chat connection operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to start the connection.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Failed to send message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Connection is not running.
    #[error("not connected")]
    NotConnected,
}

impl ChannelError {
    /// Create a start failed error.
    #[inline]
    pub fn start(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}

/// Result type for chat connection operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Missing required field.
    #[error("missing: {0}")]
    Missing(String),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a missing field error.
    #[inline]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Storage Errors
// ============================================================================

/// Error type for profile storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store could not be reached or refused the operation.
    #[error("[{backend}] unavailable: {message}")]
    Unavailable {
        /// Backend identifier (e.g., `"sqlite"`, `"file"`).
        backend: &'static str,
        /// Human-readable error description.
        message: String,
    },

    /// The backing store could not be opened at startup.
    #[error("[{backend}] init failed: {message}")]
    Init {
        /// Backend identifier.
        backend: &'static str,
        /// Human-readable error description.
        message: String,
    },

    /// A stored profile blob could not be decoded.
    #[error("corrupt profile blob: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The user id is empty or otherwise unusable as a key.
    #[error("invalid user id: {0:?}")]
    InvalidKey(String),

    /// The writer task is gone (store dropped or runtime shutting down).
    #[error("profile writer stopped")]
    WriterStopped,
}

impl StorageError {
    /// Create an [`Unavailable`](Self::Unavailable) error for the given backend.
    #[must_use]
    pub fn unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            message: message.into(),
        }
    }

    /// Create an [`Init`](Self::Init) error for the given backend.
    #[must_use]
    pub fn init(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Init {
            backend,
            message: message.into(),
        }
    }

    /// Returns `true` if this is a transient error that may succeed on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::unavailable("sqlite", e.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::unavailable("file", e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Display Helpers
// ============================================================================

/// A wrapper that displays errors in a user-friendly format.
#[derive(Debug)]
pub struct DisplayError<'a>(pub &'a BotError);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            BotError::Event(e) => write!(f, "Event error: {e}"),
            BotError::Queue(e) => write!(f, "Queue error: {e}"),
            BotError::Config(e) => write!(f, "Configuration error: {e}"),
            BotError::Channel(e) => write!(f, "Channel error: {e}"),
            BotError::Storage(e) => write!(f, "Storage error: {e}"),
            BotError::Io(e) => write!(f, "IO error: {e}"),
            BotError::Json(e) => write!(f, "JSON error: {e}"),
            BotError::Task(e) => write!(f, "Task error: {e}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

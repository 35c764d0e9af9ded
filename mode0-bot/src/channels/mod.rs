//! Chat connection implementations.
//!
//! - [`console::ConsoleChat`] - stdin/stdout, for running the bot locally
//! - [`RecordingChat`](crate::chat::RecordingChat) - in-process, keeps what it sends

pub mod console;

pub use console::ConsoleChat;

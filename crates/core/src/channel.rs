//! Channel trait: the abstraction over chat surfaces.
//!
//! A Channel is where a user types questions and reads replies. It receives
//! one line of input per turn and renders role-tagged messages back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::message::Message;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A line of input received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// The text content
    pub content: String,
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for user input.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Write a message to the surface, whatever its role.
    async fn send(&self, message: &Message) -> std::result::Result<(), ChannelError>;

    /// Show a turn failure to the user.
    async fn send_error(&self, error: &str) -> std::result::Result<(), ChannelError>;

    /// Render a message for the user. System messages are context only and
    /// are never shown.
    async fn render(&self, message: &Message) -> std::result::Result<(), ChannelError> {
        if message.is_system() {
            return Ok(());
        }
        self.send(message).await
    }
}

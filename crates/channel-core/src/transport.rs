use anyhow::Result;
use async_trait::async_trait;

use crate::user::UserDescriptor;

/// Inbound events a chat transport delivers to a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message {
        room: String,
        user: UserDescriptor,
        text: String,
        is_self: bool,
    },
    Join {
        room: String,
        identity: String,
        is_self: bool,
    },
}

/// Outbound operations on the chat network.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn join(&self, room: &str) -> Result<()>;

    async fn say(&self, room: &str, text: &str) -> Result<()>;

    /// Sends an action-styled ("/me") message.
    async fn action(&self, room: &str, text: &str) -> Result<()>;

    async fn moderators(&self, room: &str) -> Result<Vec<String>>;
}

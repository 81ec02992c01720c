use std::sync::Arc;

use anyhow::Result;

use crate::{channel::Channel, command::CommandTable, user::SharedSession};

/// Everything a command sees when it is invoked.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Raw argument string following the command token.
    pub args: String,
    pub command_name: String,
    /// The lower-cased message that matched.
    pub message: String,
    pub channel: Channel,
    /// Effective command set at dispatch time.
    pub commands: Arc<CommandTable>,
    pub default_prefix: Option<String>,
    pub user: SharedSession,
    pub is_self: bool,
}

impl CommandContext {
    pub async fn say(&self, text: impl AsRef<str> + Send) -> Result<()> {
        self.channel.say(text.as_ref()).await
    }

    pub async fn action(&self, text: impl AsRef<str> + Send) -> Result<()> {
        self.channel.action(text.as_ref()).await
    }

    /// `command_name` rendered with the default prefix, e.g. `!ping`.
    #[must_use]
    pub fn invocation(&self, command_name: &str) -> String {
        format!("{}{command_name}", self.default_prefix.as_deref().unwrap_or_default())
    }
}

//! Turning inbound chat messages into command invocations.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    channel::Channel, context::CommandContext, permissions::is_permitted, user::UserDescriptor,
};

/// What happened to an inbound message.
#[derive(Debug)]
pub enum Dispatch {
    /// Self-echo or a message for another room.
    Ignored,
    /// No configured prefix opened the message.
    NoMatch,
    UnknownCommand(String),
    /// The sender was told they may not run this command.
    Denied(String),
    /// The command was started; the handle resolves when it finishes.
    Invoked(JoinHandle<()>),
}

impl Channel {
    pub async fn on_message(
        &self,
        room: &str,
        user: &UserDescriptor,
        text: &str,
        is_self: bool,
    ) -> Dispatch {
        if is_self || room != self.name() {
            return Dispatch::Ignored;
        }

        let message = text.to_lowercase();
        let session = self.inner.users.write().await.observe(user).await;

        let (definition, ctx, permitted) = {
            let config = self.inner.config.read().await;
            let Some(hit) = config.matcher().matches(&message) else {
                return Dispatch::NoMatch;
            };
            let Some(definition) = config.resolve(hit.name).cloned() else {
                debug!(channel = %self.name(), command = %hit.name, "Unknown command");
                return Dispatch::UnknownCommand(hit.name.to_owned());
            };
            let permitted = is_permitted(&*session.read().await, hit.name, config.permissions());
            let ctx = CommandContext {
                args: hit.args.to_owned(),
                command_name: hit.name.to_owned(),
                message: message.clone(),
                channel: self.clone(),
                commands: Arc::new(config.effective_commands()),
                default_prefix: config.default_prefix().map(ToOwned::to_owned),
                user: Arc::clone(&session),
                is_self,
            };
            (definition, ctx, permitted)
        };

        if !permitted {
            let mention = session.read().await.mention_name();
            let name = ctx.command_name;
            debug!(
                channel = %self.name(),
                command = %name,
                user = %user.username,
                "Permission denied"
            );
            let reply =
                format!("Sorry, {mention}, you're not permitted to use the `{name}` command");
            if let Err(e) = self.say(&reply).await {
                warn!(error = %e, channel = %self.name(), "Failed to send permission denial");
            }
            return Dispatch::Denied(name);
        }

        debug!(
            channel = %self.name(),
            command = %ctx.command_name,
            user = %user.username,
            "Running command"
        );
        let command = Arc::clone(&definition.command);
        Dispatch::Invoked(tokio::spawn(async move {
            if let Err(e) = command.execute(&ctx).await {
                warn!(
                    error = %e,
                    channel = %ctx.channel.name(),
                    command = %ctx.command_name,
                    "Command failed"
                );
            }
        }))
    }
}

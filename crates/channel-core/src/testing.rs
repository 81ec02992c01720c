//! In-memory doubles shared by the unit tests.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{
    Mutex,
    mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tracing::debug;

use crate::{
    channel::Channel,
    command::{Command, CommandDefinition, CommandTable},
    context::CommandContext,
    dispatch::Dispatch,
    transport::ChatTransport,
    user::UserDescriptor,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Join(String),
    Say(String, String),
    Action(String, String),
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    moderators: Vec<String>,
}

impl RecordingTransport {
    pub fn with_moderators<I, S>(moderators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sent: Mutex::default(),
            moderators: moderators.into_iter().map(Into::into).collect(),
        }
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn join(&self, room: &str) -> Result<()> {
        self.sent.lock().await.push(Sent::Join(room.to_owned()));
        Ok(())
    }

    async fn say(&self, room: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .await
            .push(Sent::Say(room.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn action(&self, room: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .await
            .push(Sent::Action(room.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn moderators(&self, _room: &str) -> Result<Vec<String>> {
        Ok(self.moderators.clone())
    }
}

/// Snapshot of a [`CommandContext`] taken by [`Recorder`].
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command_name: String,
    pub args: String,
    pub message: String,
    pub username: String,
    pub default_prefix: Option<String>,
    pub commands: Vec<String>,
    pub is_self: bool,
}

#[derive(Debug)]
pub struct Recorder {
    calls: UnboundedSender<Invocation>,
}

#[async_trait]
impl Command for Recorder {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let mut commands: Vec<String> = ctx.commands.keys().cloned().collect();
        commands.sort();
        let username = ctx.user.read().await.username.clone();
        let sent = self.calls.send(Invocation {
            command_name: ctx.command_name.clone(),
            args: ctx.args.clone(),
            message: ctx.message.clone(),
            username,
            default_prefix: ctx.default_prefix.clone(),
            commands,
            is_self: ctx.is_self,
        });
        if sent.is_err() {
            debug!(command = %ctx.command_name, "Invocation recorded with nobody listening");
        }
        Ok(())
    }
}

/// Default table holding a single recording command called `name`.
pub fn defaults_with_recorder(name: &str) -> (Arc<CommandTable>, UnboundedReceiver<Invocation>) {
    let (calls, rx) = unbounded_channel();
    let mut table = CommandTable::new();
    table.insert(
        name.to_owned(),
        CommandDefinition::inherited(name, Arc::new(Recorder { calls })),
    );
    (Arc::new(table), rx)
}

/// Sends `text` from `user` and waits for the resulting command to finish.
///
/// # Panics
///
/// If the message does not start a command.
pub async fn invoke(channel: &Channel, user: &UserDescriptor, text: &str) {
    match channel.on_message(channel.name(), user, text, false).await {
        Dispatch::Invoked(handle) => handle.await.expect("command task panicked"),
        other => panic!("expected a command invocation, got {other:?}"),
    }
}

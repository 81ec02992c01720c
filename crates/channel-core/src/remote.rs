//! Commands defined by remote config payloads.
//!
//! Payload shape:
//! ```yaml
//! hello:
//!   description: Greets whoever asked
//!   action: waves at {user}
//!   say: "Hello {user}, you said: {args}"
//! ```
//! Placeholders: `{user}`, `{args}`, `{channel}`, `{prefix}`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{command::Command, context::CommandContext};

/// Turns a remote command payload into something executable.
pub trait RemoteCommandBuilder: Send + Sync {
    fn build(&self, name: &str, payload: &Value) -> Arc<dyn Command>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseCommandBuilder;

impl RemoteCommandBuilder for ResponseCommandBuilder {
    fn build(&self, name: &str, payload: &Value) -> Arc<dyn Command> {
        let response = serde_json::from_value::<ResponsePayload>(payload.clone())
            .unwrap_or_else(|e| {
                debug!(command = %name, error = %e, "Remote command payload has no response");
                ResponsePayload::default()
            });
        Arc::new(ResponseCommand { response })
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
struct ResponsePayload {
    #[serde(default)]
    say: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Replies with templated text from its payload.
#[derive(Debug)]
pub struct ResponseCommand {
    response: ResponsePayload,
}

impl ResponseCommand {
    fn render(template: &str, ctx: &CommandContext, mention: &str) -> String {
        template
            .replace("{user}", mention)
            .replace("{args}", ctx.args.trim())
            .replace("{channel}", ctx.channel.name())
            .replace("{prefix}", ctx.default_prefix.as_deref().unwrap_or_default())
    }
}

#[async_trait]
impl Command for ResponseCommand {
    fn help(&self) -> &str {
        self.response.description.as_deref().unwrap_or_default()
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let mention = ctx.user.read().await.mention_name();
        if let Some(action) = &self.response.action {
            ctx.action(Self::render(action, ctx, &mention)).await?;
        }
        if let Some(say) = &self.response.say {
            ctx.say(Self::render(say, ctx, &mention)).await?;
        }
        Ok(())
    }
}

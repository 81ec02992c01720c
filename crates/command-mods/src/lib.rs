use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use channel_core::{Command, CommandContext, CommandFactory};

#[derive(Debug)]
pub struct ModsFactory;

impl CommandFactory for ModsFactory {
    fn name(&self) -> &'static str {
        "mods"
    }

    fn build(&self) -> Arc<dyn Command> {
        Arc::new(Mods)
    }
}

#[derive(Debug)]
pub struct Mods;

#[async_trait]
impl Command for Mods {
    fn help(&self) -> &str {
        "Show who moderates this room."
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let mut moderators = ctx.channel.moderators().await?;
        if moderators.is_empty() {
            return ctx.action("looks around but finds no moderators").await;
        }
        moderators.sort();
        ctx.action(format!("moderators: {}", moderators.join(", ")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_core::{
        Channel, ChannelOptions, ChatTransport, CommandTable, UserDescriptor,
        testing::{RecordingTransport, Sent, invoke},
    };

    fn channel(transport: &Arc<RecordingTransport>) -> Channel {
        let mut defaults = CommandTable::new();
        ModsFactory.register_defaults(&mut defaults);
        Channel::new(
            ChannelOptions::new("#foo"),
            Arc::new(defaults),
            Arc::clone(transport) as Arc<dyn ChatTransport>,
        )
    }

    #[tokio::test]
    async fn lists_moderators_as_action() {
        let transport = Arc::new(RecordingTransport::with_moderators(["zed", "amy"]));
        let channel = channel(&transport);
        invoke(&channel, &UserDescriptor::new("alice"), "!mods").await;
        assert_eq!(
            transport.sent().await,
            vec![Sent::Action("#foo".to_owned(), "moderators: amy, zed".to_owned())]
        );
    }

    #[tokio::test]
    async fn reports_empty_room() {
        let transport = Arc::new(RecordingTransport::default());
        let channel = channel(&transport);
        invoke(&channel, &UserDescriptor::new("alice"), "!mods").await;
        assert_eq!(
            transport.sent().await,
            vec![Sent::Action(
                "#foo".to_owned(),
                "looks around but finds no moderators".to_owned()
            )]
        );
    }
}

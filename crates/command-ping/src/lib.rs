use std::sync::Arc;

use anyhow::Result;

use async_trait::async_trait;
use channel_core::{Command, CommandContext, CommandFactory};

#[derive(Debug)]
pub struct PingFactory;

impl CommandFactory for PingFactory {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn build(&self) -> Arc<dyn Command> {
        Arc::new(Ping)
    }
}

#[derive(Debug)]
pub struct Ping;

#[async_trait]
impl Command for Ping {
    fn help(&self) -> &str {
        "🏓"
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        ctx.say("Pong! 🏓").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_core::{
        Channel, ChannelOptions, ChatTransport, CommandTable, UserDescriptor,
        testing::{RecordingTransport, Sent, invoke},
    };

    #[tokio::test]
    async fn replies_pong() {
        let mut defaults = CommandTable::new();
        PingFactory.register_defaults(&mut defaults);
        let transport = Arc::new(RecordingTransport::default());
        let channel = Channel::new(
            ChannelOptions::new("#foo"),
            Arc::new(defaults),
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
        );

        invoke(&channel, &UserDescriptor::new("alice"), "!ping").await;

        assert_eq!(
            transport.sent().await,
            vec![Sent::Say("#foo".to_owned(), "Pong! 🏓".to_owned())]
        );
    }
}

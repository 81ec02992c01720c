use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use channel_core::{Command, CommandContext, CommandFactory};

#[derive(Debug)]
pub struct EchoFactory;

impl CommandFactory for EchoFactory {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn build(&self) -> Arc<dyn Command> {
        Arc::new(Echo)
    }
}

#[derive(Debug)]
pub struct Echo;

#[async_trait]
impl Command for Echo {
    fn help(&self) -> &str {
        "Echo text back"
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let out = ctx.args.trim();
        if out.is_empty() {
            ctx.say("(nothing to echo)").await
        } else {
            ctx.say(out).await
        }
    }
}

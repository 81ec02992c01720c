use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use channel_core::{Command, CommandContext, CommandFactory, CommandOrigin};

#[derive(Debug)]
pub struct HelpFactory;

impl CommandFactory for HelpFactory {
    fn name(&self) -> &'static str {
        "help"
    }

    fn build(&self) -> Arc<dyn Command> {
        Arc::new(Help)
    }
}

#[derive(Debug)]
pub struct Help;

#[async_trait]
impl Command for Help {
    fn help(&self) -> &str {
        "List commands: help | help <command>"
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match ctx.args.split_whitespace().next() {
            None => {
                let mut names: Vec<String> = ctx
                    .commands
                    .keys()
                    .map(|name| ctx.invocation(name))
                    .collect();
                names.sort();
                ctx.say(format!("commands: {}", names.join(", "))).await
            }
            Some(name) => {
                let name = ctx
                    .default_prefix
                    .as_deref()
                    .and_then(|prefix| name.strip_prefix(prefix))
                    .unwrap_or(name);
                let Some(def) = ctx.commands.get(name) else {
                    return ctx.say(format!("unknown command: {name}")).await;
                };
                let origin = match def.origin {
                    CommandOrigin::Inherited => "built-in",
                    CommandOrigin::RemoteOverride => "channel",
                };
                let help = def.command.help();
                let text = if help.is_empty() {
                    format!("{} ({origin})", ctx.invocation(name))
                } else {
                    format!("{} ({origin}): {help}", ctx.invocation(name))
                };
                ctx.say(text).await
            }
        }
    }
}

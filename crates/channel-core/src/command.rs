use core::fmt;
use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::context::CommandContext;

#[async_trait]
pub trait Command: Send + Sync {
    fn help(&self) -> &str {
        ""
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<()>;
}

/// Where a definition in the effective command set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    Inherited,
    RemoteOverride,
}

#[derive(Clone)]
pub struct CommandDefinition {
    pub name: String,
    pub origin: CommandOrigin,
    pub metadata: Value,
    pub command: Arc<dyn Command>,
}

impl CommandDefinition {
    pub fn inherited(name: impl Into<String>, command: Arc<dyn Command>) -> Self {
        Self {
            name: name.into(),
            origin: CommandOrigin::Inherited,
            metadata: Value::Null,
            command,
        }
    }

    pub fn remote(name: impl Into<String>, metadata: Value, command: Arc<dyn Command>) -> Self {
        Self {
            name: name.into(),
            origin: CommandOrigin::RemoteOverride,
            metadata,
            command,
        }
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

pub type CommandTable = HashMap<String, CommandDefinition>;

//! Boundary with the remote configuration store.
//!
//! Each channel namespace exposes three child collections. The store pushes
//! ordered change notifications for each of them through a [`ConfigFeed`].

use core::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Commands,
    Permissions,
    Prefixes,
}

impl Collection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commands => "commands",
            Self::Permissions => "permissions",
            Self::Prefixes => "prefixes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutation of a remote collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Added { key: String, value: Value },
    Changed { key: String, value: Value },
    Removed { key: String },
}

impl ChangeEvent {
    pub fn added(key: impl Into<String>, value: Value) -> Self {
        Self::Added {
            key: key.into(),
            value,
        }
    }

    pub fn changed(key: impl Into<String>, value: Value) -> Self {
        Self::Changed {
            key: key.into(),
            value,
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self::Removed { key: key.into() }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Changed { key, .. } | Self::Removed { key } => key,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Added { .. } => "added",
            Self::Changed { .. } => "changed",
            Self::Removed { .. } => "removed",
        }
    }
}

/// Receiving half of a namespace subscription, one ordered stream per
/// collection.
#[derive(Debug)]
pub struct ConfigFeed {
    pub commands: UnboundedReceiver<ChangeEvent>,
    pub permissions: UnboundedReceiver<ChangeEvent>,
    pub prefixes: UnboundedReceiver<ChangeEvent>,
}

/// Sending half handed to whatever produces the notifications.
#[derive(Debug, Clone)]
pub struct FeedSender {
    commands: UnboundedSender<ChangeEvent>,
    permissions: UnboundedSender<ChangeEvent>,
    prefixes: UnboundedSender<ChangeEvent>,
}

impl ConfigFeed {
    #[must_use]
    pub fn channel() -> (FeedSender, Self) {
        let (commands_tx, commands) = unbounded_channel();
        let (permissions_tx, permissions) = unbounded_channel();
        let (prefixes_tx, prefixes) = unbounded_channel();
        (
            FeedSender {
                commands: commands_tx,
                permissions: permissions_tx,
                prefixes: prefixes_tx,
            },
            Self {
                commands,
                permissions,
                prefixes,
            },
        )
    }
}

impl FeedSender {
    /// Returns `false` once the subscriber for `collection` has gone away.
    pub fn send(&self, collection: Collection, change: ChangeEvent) -> bool {
        let tx = match collection {
            Collection::Commands => &self.commands,
            Collection::Permissions => &self.permissions,
            Collection::Prefixes => &self.prefixes,
        };
        tx.send(change).is_ok()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed() && self.permissions.is_closed() && self.prefixes.is_closed()
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Starts delivering notifications for `namespace`.
    ///
    /// The first notifications describe the current contents as `Added`
    /// events. Retry and backoff are the store's own business.
    async fn subscribe(&self, namespace: &str) -> Result<ConfigFeed>;
}

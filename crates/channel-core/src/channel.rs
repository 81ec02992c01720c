use core::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tokio::sync::{RwLock, mpsc::UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::{
    command::{CommandDefinition, CommandTable},
    error::ChannelError,
    permissions::PermissionTable,
    prefix::PrefixSet,
    remote::{RemoteCommandBuilder, ResponseCommandBuilder},
    state::{ChannelStateMachine, ConnectionState},
    store::{ChangeEvent, Collection, ConfigFeed, ConfigStore},
    sync::ConfigSyncState,
    transport::{ChatEvent, ChatTransport},
    user::{RoleConfig, SharedSession, UserSessionCache},
};

/// Name the bot answers to when nobody configured one.
pub const DEFAULT_BOT_NAME: &str = "bot";

/// The built-in prefixes: `!` followed by a mention of the bot.
#[must_use]
pub fn default_prefixes(bot_name: &str) -> Vec<String> {
    vec!["!".to_owned(), format!("@{bot_name} ")]
}

fn default_bot_name() -> String {
    DEFAULT_BOT_NAME.to_owned()
}

/// Per-channel settings supplied at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelOptions {
    pub name: String,
    /// Used for the mention prefix when `prefixes` is unset.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Overrides the built-in prefixes.
    #[serde(default)]
    pub prefixes: Option<Vec<String>>,
    #[serde(default)]
    pub roles: RoleConfig,
}

impl ChannelOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bot_name: default_bot_name(),
            prefixes: None,
            roles: RoleConfig::default(),
        }
    }

    #[must_use]
    pub fn with_bot_name(mut self, bot_name: impl Into<String>) -> Self {
        self.bot_name = bot_name.into();
        self
    }

    #[must_use]
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_roles(mut self, roles: RoleConfig) -> Self {
        self.roles = roles;
        self
    }

    /// The set a new channel starts with. Never empty: configured prefixes
    /// that reduce to nothing fall back to the built-in ones.
    #[must_use]
    pub fn prefix_set(&self) -> PrefixSet {
        if let Some(configured) = &self.prefixes {
            let set = PrefixSet::new(configured.iter().map(String::as_str));
            if !set.is_empty() {
                return set;
            }
            warn!(channel = %self.name, "Configured prefixes are empty; using the built-in ones");
        }
        PrefixSet::new(default_prefixes(&self.bot_name))
    }
}

pub(crate) struct ChannelInner {
    pub(crate) name: String,
    pub(crate) transport: Arc<dyn ChatTransport>,
    pub(crate) config: RwLock<ConfigSyncState>,
    pub(crate) users: RwLock<UserSessionCache>,
    pub(crate) state: RwLock<ChannelStateMachine>,
}

/// One monitored chat room. Cloning yields another handle to the same
/// channel.
#[derive(Clone)]
pub struct Channel {
    pub(crate) inner: Arc<ChannelInner>,
}

impl Channel {
    pub fn new(
        options: ChannelOptions,
        defaults: Arc<CommandTable>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self::with_builder(options, defaults, transport, Arc::new(ResponseCommandBuilder))
    }

    pub fn with_builder(
        options: ChannelOptions,
        defaults: Arc<CommandTable>,
        transport: Arc<dyn ChatTransport>,
        builder: Arc<dyn RemoteCommandBuilder>,
    ) -> Self {
        let prefixes = options.prefix_set();
        let config = ConfigSyncState::new(options.name.clone(), defaults, prefixes, builder);
        Self {
            inner: Arc::new(ChannelInner {
                transport,
                config: RwLock::new(config),
                users: RwLock::new(UserSessionCache::new(options.roles)),
                state: RwLock::new(ChannelStateMachine::new(options.name.clone())),
                name: options.name,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name without the leading `#`, used as the store namespace.
    #[must_use]
    pub fn safe_name(&self) -> &str {
        self.name().strip_prefix('#').unwrap_or_else(|| self.name())
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.state.read().await.state()
    }

    pub async fn set_state(&self, value: &str) -> Result<ConnectionState, ChannelError> {
        self.inner.state.write().await.set(value)
    }

    pub async fn join(&self) -> Result<()> {
        self.inner.transport.join(self.name()).await
    }

    pub async fn moderators(&self) -> Result<Vec<String>> {
        self.inner.transport.moderators(self.name()).await
    }

    pub async fn say(&self, text: &str) -> Result<()> {
        self.inner.transport.say(self.name(), text).await
    }

    pub async fn action(&self, text: &str) -> Result<()> {
        self.inner.transport.action(self.name(), text).await
    }

    /// Applies one store notification.
    pub async fn apply(&self, collection: Collection, change: ChangeEvent) {
        self.inner.config.write().await.apply(collection, change);
    }

    /// Returns `true` if this event connected the channel.
    pub async fn on_join(&self, room: &str, identity: &str, is_self: bool) -> bool {
        self.inner
            .state
            .write()
            .await
            .on_join(room, identity, is_self)
    }

    pub async fn handle_chat_event(&self, event: ChatEvent) {
        match event {
            ChatEvent::Message {
                room,
                user,
                text,
                is_self,
            } => {
                let outcome = self.on_message(&room, &user, &text, is_self).await;
                debug!(channel = %self.name(), outcome = ?outcome, "Message handled");
            }
            ChatEvent::Join {
                room,
                identity,
                is_self,
            } => {
                self.on_join(&room, &identity, is_self).await;
            }
        }
    }

    pub async fn resolve(&self, name: &str) -> Option<CommandDefinition> {
        self.inner.config.read().await.resolve(name).cloned()
    }

    /// Effective command set.
    pub async fn commands(&self) -> CommandTable {
        self.inner.config.read().await.effective_commands()
    }

    pub async fn prefixes(&self) -> PrefixSet {
        self.inner.config.read().await.prefixes().clone()
    }

    pub async fn permissions(&self) -> PermissionTable {
        self.inner.config.read().await.permissions().clone()
    }

    pub async fn user(&self, username: &str) -> Option<SharedSession> {
        self.inner.users.read().await.get(username)
    }

    pub async fn subscribe(&self, store: &dyn ConfigStore) -> Result<ConfigFeed> {
        store.subscribe(self.safe_name()).await
    }

    /// Drives the channel until the feed and the event stream both close.
    ///
    /// Notifications are applied in arrival order per collection, and pending
    /// store notifications are applied before the next chat event.
    pub async fn run(self, mut feed: ConfigFeed, mut events: UnboundedReceiver<ChatEvent>) {
        info!(channel = %self.name(), "Channel started");
        loop {
            tokio::select! {
                biased;
                Some(change) = feed.prefixes.recv() => {
                    self.apply(Collection::Prefixes, change).await;
                }
                Some(change) = feed.commands.recv() => {
                    self.apply(Collection::Commands, change).await;
                }
                Some(change) = feed.permissions.recv() => {
                    self.apply(Collection::Permissions, change).await;
                }
                Some(event) = events.recv() => self.handle_chat_event(event).await,
                else => break,
            }
        }
        info!(channel = %self.name(), "Channel stopped");
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

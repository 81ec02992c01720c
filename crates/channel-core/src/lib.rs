//! Live-configured command dispatch for a single chat channel.
//!
//! A [`Channel`] keeps a local copy of three remotely edited collections
//! (commands, permissions, prefixes), reconciles store notifications into it
//! and uses it to turn chat messages into permission-checked command
//! invocations.

pub mod channel;
pub mod command;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod permissions;
pub mod prefix;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;
pub mod transport;
pub mod user;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use channel::{Channel, ChannelOptions, DEFAULT_BOT_NAME, default_prefixes};
pub use command::{Command, CommandDefinition, CommandOrigin, CommandTable};
pub use context::CommandContext;
pub use dispatch::Dispatch;
pub use error::ChannelError;
pub use factory::CommandFactory;
pub use permissions::{PermissionRule, PermissionTable, is_permitted};
pub use prefix::{CommandMatch, PrefixMatcher, PrefixSet};
pub use remote::{RemoteCommandBuilder, ResponseCommandBuilder};
pub use state::{ChannelStateMachine, ConnectionState};
pub use store::{ChangeEvent, Collection, ConfigFeed, ConfigStore, FeedSender};
pub use sync::ConfigSyncState;
pub use transport::{ChatEvent, ChatTransport};
pub use user::{RoleConfig, SharedSession, UserDescriptor, UserSession, UserSessionCache};

//! Local reconciliation of the three remote collections.
//!
//! Commands are kept in two layers: the inherited defaults shared by every
//! channel and a channel-local overlay fed by the store. Lookups read the
//! overlay first. Remote mutations only ever touch the overlay.

use core::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::{
    command::{CommandDefinition, CommandTable},
    permissions::{PermissionRule, PermissionTable},
    prefix::{PrefixMatcher, PrefixSet},
    remote::RemoteCommandBuilder,
    store::{ChangeEvent, Collection},
};

pub struct ConfigSyncState {
    channel: String,
    defaults: Arc<CommandTable>,
    overrides: CommandTable,
    permissions: PermissionTable,
    default_prefixes: PrefixSet,
    prefixes: PrefixSet,
    matcher: PrefixMatcher,
    builder: Arc<dyn RemoteCommandBuilder>,
}

impl ConfigSyncState {
    pub fn new(
        channel: impl Into<String>,
        defaults: Arc<CommandTable>,
        default_prefixes: PrefixSet,
        builder: Arc<dyn RemoteCommandBuilder>,
    ) -> Self {
        let matcher = PrefixMatcher::compile(&default_prefixes);
        Self {
            channel: channel.into(),
            defaults,
            overrides: CommandTable::new(),
            permissions: PermissionTable::new(),
            prefixes: default_prefixes.clone(),
            default_prefixes,
            matcher,
            builder,
        }
    }

    pub fn apply(&mut self, collection: Collection, change: ChangeEvent) {
        match collection {
            Collection::Commands => self.apply_command(change),
            Collection::Permissions => self.apply_permission(change),
            Collection::Prefixes => self.apply_prefixes(change),
        }
    }

    fn apply_command(&mut self, change: ChangeEvent) {
        match change {
            ChangeEvent::Added { key, value } => {
                self.put_override(&key, value);
                info!(channel = %self.channel, command = %key, "Command added");
            }
            ChangeEvent::Changed { key, value } => {
                self.put_override(&key, value);
                info!(channel = %self.channel, command = %key, "Command modified");
            }
            ChangeEvent::Removed { key } => {
                self.overrides.remove(&key);
                info!(channel = %self.channel, command = %key, "Command removed");
            }
        }
    }

    fn put_override(&mut self, key: &str, value: Value) {
        let command = self.builder.build(key, &value);
        self.overrides.insert(
            key.to_owned(),
            CommandDefinition::remote(key, value, command),
        );
    }

    fn apply_permission(&mut self, change: ChangeEvent) {
        match change {
            ChangeEvent::Added { key, value } | ChangeEvent::Changed { key, value } => {
                match PermissionRule::from_value(&value) {
                    Some(rule) => {
                        info!(
                            channel = %self.channel,
                            command = %key,
                            principals = ?rule,
                            "Permissions set"
                        );
                        self.permissions.insert(key, rule);
                    }
                    None => {
                        info!(channel = %self.channel, command = %key, "Permissions cleared");
                        self.permissions.remove(&key);
                    }
                }
            }
            ChangeEvent::Removed { key } => {
                self.permissions.remove(&key);
                info!(channel = %self.channel, command = %key, "Permissions removed");
            }
        }
    }

    fn apply_prefixes(&mut self, change: ChangeEvent) {
        let prefixes = match change {
            ChangeEvent::Added { value, .. } | ChangeEvent::Changed { value, .. } => {
                PrefixSet::from_value(&value)
            }
            ChangeEvent::Removed { .. } => self.default_prefixes.clone(),
        };
        self.set_prefixes(prefixes);
    }

    /// Replaces the prefix set and recompiles the matching rule.
    pub fn set_prefixes(&mut self, prefixes: PrefixSet) {
        self.matcher = PrefixMatcher::compile(&prefixes);
        self.prefixes = prefixes;
        info!(
            channel = %self.channel,
            prefixes = ?self.prefixes.iter().collect::<Vec<_>>(),
            "Prefixes updated"
        );
    }

    /// Looks `name` up in the overlay, then in the inherited defaults.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&CommandDefinition> {
        self.overrides.get(name).or_else(|| self.defaults.get(name))
    }

    /// Defaults merged with the overlay; the overlay wins on collisions.
    #[must_use]
    pub fn effective_commands(&self) -> CommandTable {
        let mut merged = (*self.defaults).clone();
        merged.extend(
            self.overrides
                .iter()
                .map(|(name, def)| (name.clone(), def.clone())),
        );
        merged
    }

    #[must_use]
    pub const fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    #[must_use]
    pub const fn prefixes(&self) -> &PrefixSet {
        &self.prefixes
    }

    #[must_use]
    pub const fn matcher(&self) -> &PrefixMatcher {
        &self.matcher
    }

    #[must_use]
    pub fn default_prefix(&self) -> Option<&str> {
        self.prefixes.first()
    }

    #[must_use]
    pub const fn overrides(&self) -> &CommandTable {
        &self.overrides
    }

    #[must_use]
    pub fn defaults(&self) -> &CommandTable {
        &self.defaults
    }
}

impl fmt::Debug for ConfigSyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSyncState")
            .field("channel", &self.channel)
            .field("defaults", &self.defaults.keys().collect::<Vec<_>>())
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .field("permissions", &self.permissions)
            .field("prefixes", &self.prefixes)
            .finish_non_exhaustive()
    }
}

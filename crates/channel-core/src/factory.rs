use std::sync::Arc;

use crate::command::{Command, CommandDefinition, CommandTable};

/// Interface for commands shipped as inherited defaults.
///
/// Each built-in command crate exposes a factory; the bot collects them into
/// the default [`CommandTable`] shared by every channel.
pub trait CommandFactory {
    /// Name the command is invoked by.
    fn name(&self) -> &'static str;

    /// Builds the command instance.
    #[must_use]
    fn build(&self) -> Arc<dyn Command>;

    /// Adds the command to `table` unless something already claimed its name.
    fn register_defaults(&self, table: &mut CommandTable) {
        table
            .entry(self.name().to_owned())
            .or_insert_with(|| CommandDefinition::inherited(self.name(), self.build()));
    }
}

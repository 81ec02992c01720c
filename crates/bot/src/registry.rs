use std::sync::Arc;

use channel_core::{CommandFactory, CommandTable};
use tracing::info;

/// Builds the command table every channel inherits before any remote
/// overrides are applied. Commands are stateless; one instance is shared.
pub(crate) fn build_defaults() -> Arc<CommandTable> {
    #[rustfmt::skip]
    let factories: [&dyn CommandFactory; 4] = [
        &command_ping::PingFactory,
        &command_echo::EchoFactory,
        &command_help::HelpFactory,
        &command_mods::ModsFactory,
    ];

    let mut table = CommandTable::new();
    for factory in factories {
        factory.register_defaults(&mut table);
    }

    let mut names: Vec<&str> = table.keys().map(String::as_str).collect();
    names.sort_unstable();
    info!(commands = ?names, "Registered default commands");

    Arc::new(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_core::CommandOrigin;

    #[test]
    fn registers_every_builtin_as_inherited() {
        let table = build_defaults();
        let mut names: Vec<&str> = table.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, ["echo", "help", "mods", "ping"]);
        assert!(
            table
                .values()
                .all(|def| def.origin == CommandOrigin::Inherited)
        );
    }
}

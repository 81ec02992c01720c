use core::{fmt, str::FromStr};

use tracing::info;

use crate::error::ChannelError;

const ALLOWED_STATES: &str = "connected, disconnected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = ChannelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            other => Err(ChannelError::InvalidState {
                value: other.to_owned(),
                allowed: ALLOWED_STATES,
            }),
        }
    }
}

/// Connection lifecycle of one channel.
#[derive(Debug)]
pub struct ChannelStateMachine {
    room: String,
    state: ConnectionState,
}

impl ChannelStateMachine {
    pub fn new(room: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            state: ConnectionState::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Assigns a state by name, rejecting anything but the known states.
    pub fn set(&mut self, value: &str) -> Result<ConnectionState, ChannelError> {
        self.state = value.parse()?;
        Ok(self.state)
    }

    /// Handles a join confirmation. Returns `true` only for the event that
    /// moved the channel to `connected`; later confirmations are no-ops.
    pub fn on_join(&mut self, room: &str, identity: &str, is_self: bool) -> bool {
        if !is_self || !room.eq_ignore_ascii_case(&self.room) {
            return false;
        }
        if self.state == ConnectionState::Connected {
            return false;
        }
        self.state = ConnectionState::Connected;
        info!(channel = %self.room, identity = %identity, "Joined channel");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        assert_eq!(
            ChannelStateMachine::new("#foo").state(),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn self_join_connects() {
        let mut sm = ChannelStateMachine::new("#foo");
        assert!(sm.on_join("#foo", "bot", true));
        assert_eq!(sm.state(), ConnectionState::Connected);
    }

    #[test]
    fn join_room_match_ignores_case() {
        let mut sm = ChannelStateMachine::new("#Foo");
        assert!(sm.on_join("#foo", "bot", true));
    }

    #[test]
    fn other_users_and_rooms_are_ignored() {
        let mut sm = ChannelStateMachine::new("#foo");
        assert!(!sm.on_join("#foo", "alice", false));
        assert!(!sm.on_join("#bar", "bot", true));
        assert_eq!(sm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn repeated_confirmations_are_no_ops() {
        let mut sm = ChannelStateMachine::new("#foo");
        assert!(sm.on_join("#foo", "bot", true));
        assert!(!sm.on_join("#foo", "bot", true));
        assert_eq!(sm.state(), ConnectionState::Connected);
    }

    #[test]
    fn set_accepts_known_states() {
        let mut sm = ChannelStateMachine::new("#foo");
        assert_eq!(sm.set("connected").unwrap(), ConnectionState::Connected);
        assert_eq!(sm.set("disconnected").unwrap(), ConnectionState::Disconnected);
    }

    #[test]
    fn set_rejects_unknown_state() {
        let mut sm = ChannelStateMachine::new("#foo");
        let err = sm.set("reconnecting").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidState { .. }));
        assert!(err.to_string().contains("connected, disconnected"));
        assert_eq!(sm.state(), ConnectionState::Disconnected);
    }
}

use thiserror::Error;

/// Failures surfaced by channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel received invalid state `{value}`. State must be one of: {allowed}")]
    InvalidState { value: String, allowed: &'static str },

    /// A transport was asked to act on a channel it never joined.
    #[error("no room is known for channel {0}")]
    UnknownChannel(String),
}

//! Error taxonomy for cable operations.

use crate::identifier::Identifier;

/// Errors returned by cable operations and inbound frame decoding.
///
/// Every variant is a value; nothing in the protocol core panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CableError {
    /// Operation attempted before the server sent its welcome.
    Disconnected,
    /// Operation needs an active subscription that does not exist.
    ChannelNotSubscribed(Identifier),
    /// Subscribe attempted on a confirmed subscription.
    AlreadySubscribed(Identifier),
    /// Subscribe attempted while a previous attempt awaits confirmation.
    AlreadyTryingToSubscribe(Identifier),
    /// Malformed inbound frame or identifier, or a transport failure.
    General(String),
}

impl std::fmt::Display for CableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Cable is not connected"),
            Self::ChannelNotSubscribed(id) => write!(f, "Not subscribed to channel: {id}"),
            Self::AlreadySubscribed(id) => write!(f, "Already subscribed to channel: {id}"),
            Self::AlreadyTryingToSubscribe(id) => {
                write!(f, "Subscription already pending for channel: {id}")
            }
            Self::General(msg) => write!(f, "Cable error: {msg}"),
        }
    }
}

impl std::error::Error for CableError {}

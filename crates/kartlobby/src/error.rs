//! Error types for the lobby layer.

use kartlobby_protocol::{LobbyEvent, ProtocolError};
use kartlobby_transport::{HostId, TransportError};

use crate::LobbyState;

/// Errors that can occur during lobby operations.
///
/// Message-level failures (everything up to `UnexpectedMessage`) are
/// recovered by dropping the message. The rest surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// A second lobby was created while one is still alive.
    #[error("a lobby is already active in this process")]
    AlreadyActive,

    /// A `VOTE` payload could not be decoded.
    #[error("malformed vote: {0}")]
    MalformedVote(#[source] ProtocolError),

    /// The message's first byte is not in the catalog.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// A vote arrived from a host that is not in the roster.
    #[error("vote from unknown host {0}")]
    VoteFromUnknownHost(HostId),

    /// Any other message from a host the lobby does not know.
    #[error("message from unknown host {0}")]
    UnknownHost(HostId),

    /// A payload could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Sending to a peer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The state machine does not allow this move.
    #[error("invalid lobby transition {from} -> {to}")]
    InvalidTransition { from: LobbyState, to: LobbyState },

    /// A known message arrived at a point in the cycle where it makes no
    /// sense, or at a role that never handles it.
    #[error("unexpected {event} in state {state}")]
    UnexpectedMessage { event: LobbyEvent, state: LobbyState },

    /// Kart slots were already bound for this race.
    #[error("remote karts already configured for this race")]
    KartsAlreadyConfigured,

    /// The race-start worker could not be spawned.
    #[error("failed to spawn race-start worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The race-start worker panicked before finishing.
    #[error("race-start worker panicked")]
    WorkerPanicked,

    /// A config document failed to parse.
    #[cfg(feature = "json")]
    #[error("invalid lobby config: {0}")]
    Config(#[source] serde_json::Error),
}

impl LobbyError {
    /// Lifts an opcode decode failure, keeping unknown opcodes distinct so
    /// they can be counted.
    pub(crate) fn from_opcode(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownOpcode(op) => Self::UnknownOpcode(op),
            other => Self::Protocol(other),
        }
    }

    /// Returns `true` for failures caused by a single bad message, which
    /// are logged and dropped.
    pub fn is_message_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedVote(_)
                | Self::UnknownOpcode(_)
                | Self::VoteFromUnknownHost(_)
                | Self::UnknownHost(_)
                | Self::Protocol(_)
                | Self::UnexpectedMessage { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_opcode_is_lifted() {
        assert!(matches!(
            LobbyError::from_opcode(ProtocolError::UnknownOpcode(200)),
            LobbyError::UnknownOpcode(200)
        ));
        assert!(matches!(
            LobbyError::from_opcode(ProtocolError::Empty),
            LobbyError::Protocol(ProtocolError::Empty)
        ));
    }

    #[test]
    fn test_message_errors_are_classified() {
        assert!(LobbyError::UnknownOpcode(99).is_message_error());
        assert!(LobbyError::VoteFromUnknownHost(HostId(3)).is_message_error());
        assert!(!LobbyError::AlreadyActive.is_message_error());
        assert!(!LobbyError::WorkerPanicked.is_message_error());
    }

    #[test]
    fn test_display_names_the_states() {
        let err = LobbyError::InvalidTransition {
            from: LobbyState::Init,
            to: LobbyState::Racing,
        };
        assert_eq!(err.to_string(), "invalid lobby transition Init -> Racing");
    }
}

//! A single peer's track vote.

use crate::{NetworkString, ProtocolError, WideString, WireCodec};

/// A peer's preferred race configuration: track, laps and direction.
///
/// Wire layout, in order:
///
/// ```text
/// [wstring player_name][string track_name][u8 num_laps][u8 reverse]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerVote {
    pub player_name: WideString,
    pub track_name: String,
    /// At least 1 by protocol convention; not enforced on decode.
    pub num_laps: u8,
    pub reverse: bool,
}

impl PeerVote {
    /// Builds a vote; `player_name` is converted to code units.
    pub fn new(
        player_name: impl Into<WideString>,
        track_name: impl Into<String>,
        num_laps: u8,
        reverse: bool,
    ) -> Self {
        Self {
            player_name: player_name.into(),
            track_name: track_name.into(),
            num_laps,
            reverse,
        }
    }
}

impl Default for PeerVote {
    fn default() -> Self {
        Self::new("", "", 1, false)
    }
}

impl WireCodec for PeerVote {
    fn encode(&self, ns: &mut NetworkString) -> Result<(), ProtocolError> {
        ns.encode_wstring(&self.player_name)?
            .encode_string(&self.track_name)?
            .add_u8(self.num_laps)
            .add_bool(self.reverse);
        Ok(())
    }

    fn decode(ns: &mut NetworkString) -> Result<Self, ProtocolError> {
        let player_name = ns.decode_wstring()?;
        let track_name = ns.decode_string()?;
        let num_laps = ns.get_u8()?;
        let reverse = ns.get_bool()?;
        Ok(Self {
            player_name,
            track_name,
            num_laps,
            reverse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LobbyEvent;

    #[test]
    fn test_default_vote() {
        let vote = PeerVote::default();
        assert!(vote.player_name.is_empty());
        assert!(vote.track_name.is_empty());
        assert_eq!(vote.num_laps, 1);
        assert!(!vote.reverse);
    }

    #[test]
    fn test_vote_wire_layout() {
        let vote = PeerVote::new("Al", "x", 3, true);
        let mut ns = NetworkString::default();
        ns.encode(&vote).unwrap();
        assert_eq!(
            ns.as_bytes(),
            &[0, 2, 0, b'A', 0, b'l', 1, b'x', 3, 1]
        );
    }

    #[test]
    fn test_vote_message_round_trip_with_wide_name() {
        let vote = PeerVote::new("Léa", "cocoa_temple", 1, true);
        let mut ns = NetworkString::new(LobbyEvent::Vote);
        ns.encode(&vote).unwrap();

        let mut rx = NetworkString::from_bytes(ns.into_bytes());
        assert_eq!(rx.read_event().unwrap(), LobbyEvent::Vote);
        let decoded: PeerVote = rx.decode().unwrap();
        assert_eq!(decoded, vote);
        assert_eq!(decoded.player_name, "Léa");
    }

    #[test]
    fn test_truncated_vote_is_an_error() {
        let vote = PeerVote::new("Alice", "hacienda", 3, false);
        let mut ns = NetworkString::default();
        ns.encode(&vote).unwrap();
        let mut bytes = ns.into_bytes();
        bytes.pop();

        let mut rx = NetworkString::from_bytes(bytes);
        assert!(matches!(
            rx.decode::<PeerVote>(),
            Err(ProtocolError::Truncated { .. })
        ));
    }
}

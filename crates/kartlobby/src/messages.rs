//! Builders and payload types for lobby messages.
//!
//! Every function here returns a complete message: opcode byte first,
//! then the payload. Parsing happens in the roles, which read the opcode
//! once and then decode the payload types defined below.

use kartlobby_protocol::{
    LobbyEvent, NetworkString, PeerVote, ProtocolError, RejectReason, WideString, WireCodec,
};
use kartlobby_transport::HostId;

use crate::{RaceConfig, RemoteKart};

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// One row of `UPDATE_PLAYER_LIST`: `[u32 host][wstring name]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerListEntry {
    pub host_id: HostId,
    pub name: WideString,
}

impl WireCodec for PlayerListEntry {
    fn encode(&self, ns: &mut NetworkString) -> Result<(), ProtocolError> {
        ns.add_host_id(self.host_id).encode_wstring(&self.name)?;
        Ok(())
    }

    fn decode(ns: &mut NetworkString) -> Result<Self, ProtocolError> {
        Ok(Self {
            host_id: ns.get_host_id()?,
            name: ns.decode_wstring()?,
        })
    }
}

/// One kart binding inside `LOAD_WORLD`: `[u32 host][wstring name][string kart]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KartBinding {
    pub host_id: HostId,
    pub name: WideString,
    pub kart: String,
}

impl From<&RemoteKart> for KartBinding {
    fn from(kart: &RemoteKart) -> Self {
        Self {
            host_id: kart.host_id,
            name: kart.player_name.clone(),
            kart: kart.kart.clone(),
        }
    }
}

impl WireCodec for KartBinding {
    fn encode(&self, ns: &mut NetworkString) -> Result<(), ProtocolError> {
        ns.add_host_id(self.host_id)
            .encode_wstring(&self.name)?
            .encode_string(&self.kart)?;
        Ok(())
    }

    fn decode(ns: &mut NetworkString) -> Result<Self, ProtocolError> {
        Ok(Self {
            host_id: ns.get_host_id()?,
            name: ns.decode_wstring()?,
            kart: ns.decode_string()?,
        })
    }
}

/// `LOAD_WORLD` payload: the race and every kart in slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWorld {
    pub race: RaceConfig,
    pub karts: Vec<KartBinding>,
}

impl WireCodec for LoadWorld {
    fn encode(&self, ns: &mut NetworkString) -> Result<(), ProtocolError> {
        ns.encode_string(&self.race.track)?
            .add_u8(self.race.laps)
            .add_bool(self.race.reverse)
            .encode_list(&self.karts)?;
        Ok(())
    }

    fn decode(ns: &mut NetworkString) -> Result<Self, ProtocolError> {
        let track = ns.decode_string()?;
        let laps = ns.get_u8()?;
        let reverse = ns.get_bool()?;
        let karts = ns.decode_list()?;
        Ok(Self {
            race: RaceConfig::new(track, laps, reverse),
            karts,
        })
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A message with no payload.
pub fn bare(event: LobbyEvent) -> NetworkString {
    NetworkString::new(event)
}

/// `CONNECTION_REQUESTED [wstring name]`.
pub fn connection_requested(name: &WideString) -> Result<NetworkString, ProtocolError> {
    let mut ns = NetworkString::new(LobbyEvent::ConnectionRequested);
    ns.encode_wstring(name)?;
    Ok(ns)
}

/// `CONNECTION_REFUSED [u8 reason]`.
pub fn connection_refused(reason: RejectReason) -> NetworkString {
    let mut ns = NetworkString::new(LobbyEvent::ConnectionRefused);
    ns.add_u8(reason.into());
    ns
}

/// `CONNECTION_ACCEPTED [u32 host]`.
pub fn connection_accepted(host: HostId) -> NetworkString {
    let mut ns = NetworkString::new(LobbyEvent::ConnectionAccepted);
    ns.add_host_id(host);
    ns
}

/// `UPDATE_PLAYER_LIST [u8 n]{[u32 host][wstring name]}`.
pub fn update_player_list(players: &[PlayerListEntry]) -> Result<NetworkString, ProtocolError> {
    let mut ns = NetworkString::new(LobbyEvent::UpdatePlayerList);
    ns.encode_list(players)?;
    Ok(ns)
}

/// `START_SELECTION [u32 voting_ms]`.
pub fn start_selection(voting_window_ms: u32) -> NetworkString {
    let mut ns = NetworkString::new(LobbyEvent::StartSelection);
    ns.add_u32(voting_window_ms);
    ns
}

/// `KART_SELECTION [string kart]`.
pub fn kart_selection(kart: &str) -> Result<NetworkString, ProtocolError> {
    let mut ns = NetworkString::new(LobbyEvent::KartSelection);
    ns.encode_string(kart)?;
    Ok(ns)
}

/// Client to server: `[VOTE][PeerVote]`.
pub fn vote(vote: &PeerVote) -> Result<NetworkString, ProtocolError> {
    let mut ns = NetworkString::new(LobbyEvent::Vote);
    ns.encode(vote)?;
    Ok(ns)
}

/// Server to clients: `[VOTE][u32 host][PeerVote]`.
pub fn relayed_vote(host: HostId, vote: &PeerVote) -> Result<NetworkString, ProtocolError> {
    let mut ns = NetworkString::new(LobbyEvent::Vote);
    ns.add_host_id(host).encode(vote)?;
    Ok(ns)
}

/// `LOAD_WORLD`: the race config, then one binding per kart slot.
pub fn load_world(payload: &LoadWorld) -> Result<NetworkString, ProtocolError> {
    let mut ns = NetworkString::new(LobbyEvent::LoadWorld);
    ns.encode(payload)?;
    Ok(ns)
}

/// `PLAYER_DISCONNECTED [u32 host]`.
pub fn player_disconnected(host: HostId) -> NetworkString {
    let mut ns = NetworkString::new(LobbyEvent::PlayerDisconnected);
    ns.add_host_id(host);
    ns
}

/// `CHAT [wstring text]`.
pub fn chat(text: &WideString) -> Result<NetworkString, ProtocolError> {
    let mut ns = NetworkString::new(LobbyEvent::Chat);
    ns.encode_wstring(text)?;
    Ok(ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reopen(ns: NetworkString, expected: LobbyEvent) -> NetworkString {
        let mut ns = NetworkString::from_bytes(ns.into_bytes());
        assert_eq!(ns.read_event().unwrap(), expected);
        ns
    }

    #[test]
    fn test_refusal_carries_reason_byte() {
        let ns = connection_refused(RejectReason::TooManyPlayers);
        assert_eq!(ns.as_bytes(), &[u8::from(LobbyEvent::ConnectionRefused), 4]);
    }

    #[test]
    fn test_accepted_host_is_big_endian() {
        let ns = connection_accepted(HostId(0x0102_0304));
        assert_eq!(ns.as_bytes(), &[3, 1, 2, 3, 4]);
    }

    #[test]
    fn test_relayed_vote_prefixes_host() {
        let cast = PeerVote::new("Kim", "hacienda", 2, true);
        let mut ns = reopen(relayed_vote(HostId(9), &cast).unwrap(), LobbyEvent::Vote);
        assert_eq!(ns.get_host_id().unwrap(), HostId(9));
        assert_eq!(ns.decode::<PeerVote>().unwrap(), cast);
        assert_eq!(ns.remaining(), 0);
    }

    #[test]
    fn test_load_world_payload() {
        let payload = LoadWorld {
            race: RaceConfig::new("zengarden", 4, false),
            karts: vec![
                KartBinding {
                    host_id: HostId(1),
                    name: "Ana".into(),
                    kart: "tux".to_owned(),
                },
                KartBinding {
                    host_id: HostId(2),
                    name: "Zoé".into(),
                    kart: "nolok".to_owned(),
                },
            ],
        };
        let mut ns = reopen(load_world(&payload).unwrap(), LobbyEvent::LoadWorld);
        assert_eq!(ns.decode::<LoadWorld>().unwrap(), payload);
    }

    #[test]
    fn test_player_list_truncated_entry_fails() {
        let players = vec![PlayerListEntry {
            host_id: HostId(5),
            name: "Ana".into(),
        }];
        let mut bytes = update_player_list(&players).unwrap().into_bytes();
        bytes.truncate(bytes.len() - 1);

        let mut ns = NetworkString::from_bytes(bytes);
        ns.read_event().unwrap();
        assert!(matches!(
            ns.decode_list::<PlayerListEntry>(),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_bare_messages_are_one_byte() {
        for event in [LobbyEvent::StartRace, LobbyEvent::ExitResult, LobbyEvent::RequestBegin] {
            assert_eq!(bare(event).as_bytes(), &[u8::from(event)]);
        }
    }
}

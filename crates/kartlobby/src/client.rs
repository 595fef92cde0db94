//! The client lobby role.
//!
//! A client asks to join, mirrors the server's roster and votes, and moves
//! through the race cycle only when the server says so. The one exception
//! is its local voting countdown, which starts when the player confirms a
//! kart and exists purely for display.

use std::sync::Arc;

use kartlobby_protocol::{LobbyEvent, NetworkString, PeerVote, RejectReason, WideString};
use kartlobby_transport::{HostId, Transport};
use tracing::{debug, info, warn};

use crate::messages::{self, LoadWorld, PlayerListEntry};
use crate::{LobbyBase, LobbyError, LobbyRole, LobbyState, NetworkPlayerProfile};

/// Client side of the lobby.
pub struct ClientLobby {
    player_name: WideString,
    server: HostId,
    transport: Arc<dyn Transport>,
    /// Assigned by `CONNECTION_ACCEPTED`.
    host_id: Option<HostId>,
    rejection: Option<RejectReason>,
    players: Vec<PlayerListEntry>,
    /// From `START_SELECTION`, in seconds.
    voting_window: f32,
    /// Kart bindings from the last `LOAD_WORLD`.
    remote: Vec<NetworkPlayerProfile>,
    chat: Vec<WideString>,
    world_loaded: bool,
}

impl ClientLobby {
    /// A client that will introduce itself to `server` as `player_name`.
    pub fn new(
        player_name: impl Into<WideString>,
        server: HostId,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            player_name: player_name.into(),
            server,
            transport,
            host_id: None,
            rejection: None,
            players: Vec::new(),
            voting_window: 0.0,
            remote: Vec::new(),
            chat: Vec::new(),
            world_loaded: false,
        }
    }

    /// The name sent with the connection request.
    pub fn player_name(&self) -> &WideString {
        &self.player_name
    }

    /// The id the server assigned to us, once accepted.
    pub fn host_id(&self) -> Option<HostId> {
        self.host_id
    }

    /// Why the server refused us, if it did.
    pub fn rejection(&self) -> Option<RejectReason> {
        self.rejection
    }

    /// The roster as last broadcast by the server.
    pub fn players(&self) -> &[PlayerListEntry] {
        &self.players
    }

    /// Chat lines received so far, oldest first.
    pub fn chat_log(&self) -> &[WideString] {
        &self.chat
    }

    /// Returns `true` once `CLIENT_LOADED_WORLD` went out this race.
    pub fn has_loaded_world(&self) -> bool {
        self.world_loaded
    }

    // -- operations driven by the local player --

    /// Asks the server to close admission and start kart selection.
    pub fn request_begin(&mut self) -> Result<(), LobbyError> {
        self.send(&messages::bare(LobbyEvent::RequestBegin))
    }

    /// Confirms our kart and starts the local voting countdown.
    pub fn select_kart(&mut self, lobby: &LobbyBase, kart: &str) -> Result<(), LobbyError> {
        if lobby.state() != LobbyState::Selection {
            return Err(LobbyError::InvalidTransition {
                from: lobby.state(),
                to: LobbyState::Voting,
            });
        }
        self.send(&messages::kart_selection(kart)?)?;
        lobby.transition(LobbyState::Voting)?;
        lobby.start_voting_period(self.voting_window);
        info!(kart, "kart selected");
        Ok(())
    }

    /// Sends our vote. Our own vote comes back through the server's relay
    /// like everybody else's.
    pub fn vote(
        &mut self,
        lobby: &LobbyBase,
        track: &str,
        laps: u8,
        reverse: bool,
    ) -> Result<(), LobbyError> {
        if !lobby.state().accepts_votes() {
            return Err(LobbyError::UnexpectedMessage {
                event: LobbyEvent::Vote,
                state: lobby.state(),
            });
        }
        let vote = PeerVote::new(self.player_name.clone(), track, laps, reverse);
        debug!(track, laps, reverse, "casting vote");
        self.send(&messages::vote(&vote)?)
    }

    /// Sends a chat line; the server relays it with our name.
    pub fn send_chat(&mut self, text: &str) -> Result<(), LobbyError> {
        self.send(&messages::chat(&WideString::from(text))?)
    }

    /// Acknowledges the result screen.
    pub fn acknowledge_result(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        if lobby.state() != LobbyState::Result {
            return Err(LobbyError::UnexpectedMessage {
                event: LobbyEvent::RaceFinishedAck,
                state: lobby.state(),
            });
        }
        self.send(&messages::bare(LobbyEvent::RaceFinishedAck))
    }

    // -- message handlers --

    fn handle_load_world(
        &mut self,
        lobby: &LobbyBase,
        msg: &mut NetworkString,
    ) -> Result<(), LobbyError> {
        let payload: LoadWorld = msg.decode()?;
        if lobby.state() == LobbyState::Selection {
            // Kart never confirmed locally; the server bound a default.
            lobby.transition(LobbyState::Voting)?;
        }
        lobby.transition(LobbyState::Loading)?;

        info!(
            track = %payload.race.track,
            laps = payload.race.laps,
            reverse = payload.race.reverse,
            karts = payload.karts.len(),
            "loading world"
        );
        self.remote = payload
            .karts
            .into_iter()
            .enumerate()
            .map(|(slot, binding)| NetworkPlayerProfile {
                host_id: binding.host_id,
                name: binding.name,
                kart: Some(binding.kart),
                arrival: slot as u64,
            })
            .collect();
        self.world_loaded = false;

        lobby.clear_votes();
        lobby.game_setup_mut().set_race(payload.race);
        self.load_world(lobby)
    }

    fn handle_exit_result(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        lobby.transition(LobbyState::Init)?;
        lobby.game_setup_mut().reset();
        self.remote.clear();
        self.world_loaded = false;
        self.setup(lobby)
    }

    fn send(&self, msg: &NetworkString) -> Result<(), LobbyError> {
        self.transport.send_to(self.server, msg.as_bytes())?;
        Ok(())
    }
}

impl LobbyRole for ClientLobby {
    fn setup(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        lobby.transition(LobbyState::Connecting)?;
        if self.host_id.is_none() {
            info!(server = %self.server, name = %self.player_name, "requesting connection");
            self.send(&messages::connection_requested(&self.player_name)?)?;
        }
        Ok(())
    }

    fn update(&mut self, _lobby: &LobbyBase, _ticks: u32) -> Result<(), LobbyError> {
        Ok(())
    }

    fn handle_event(
        &mut self,
        lobby: &LobbyBase,
        from: HostId,
        event: LobbyEvent,
        msg: &mut NetworkString,
    ) -> Result<(), LobbyError> {
        if from != self.server {
            return Err(LobbyError::UnknownHost(from));
        }

        match event {
            LobbyEvent::ConnectionAccepted => {
                let id = msg.get_host_id()?;
                info!(host_id = %id, "connection accepted");
                self.host_id = Some(id);
                self.rejection = None;
                Ok(())
            }
            LobbyEvent::ConnectionRefused => {
                let reason = RejectReason::try_from(msg.get_u8()?)?;
                warn!(%reason, "connection refused");
                self.rejection = Some(reason);
                Ok(())
            }
            LobbyEvent::UpdatePlayerList => {
                self.players = msg.decode_list()?;
                debug!(players = self.players.len(), "player list updated");
                Ok(())
            }
            LobbyEvent::StartSelection => {
                let window_ms = msg.get_u32()?;
                lobby.transition(LobbyState::Selection)?;
                self.voting_window = window_ms as f32 / 1000.0;
                info!(voting_window_ms = window_ms, "kart selection started");
                Ok(())
            }
            LobbyEvent::Vote => {
                let host = msg.get_host_id()?;
                let vote: PeerVote = msg.decode().map_err(LobbyError::MalformedVote)?;
                lobby.add_vote(host, vote);
                Ok(())
            }
            LobbyEvent::LoadWorld => self.handle_load_world(lobby, msg),
            LobbyEvent::StartRace => {
                lobby.transition(LobbyState::Racing)?;
                info!("race started");
                Ok(())
            }
            LobbyEvent::RaceFinished => {
                lobby.transition(LobbyState::Result)?;
                info!("race finished");
                Ok(())
            }
            LobbyEvent::ExitResult => self.handle_exit_result(lobby),
            LobbyEvent::Chat => {
                let line = msg.decode_wstring()?;
                debug!(line = %line, "chat");
                self.chat.push(line);
                Ok(())
            }
            LobbyEvent::PlayerDisconnected => {
                let host = msg.get_host_id()?;
                self.players.retain(|p| p.host_id != host);
                lobby.remove_vote(host);
                info!(%host, "player disconnected");
                Ok(())
            }
            LobbyEvent::ServerInfo
            | LobbyEvent::ServerOwnership
            | LobbyEvent::KickHost
            | LobbyEvent::ChangeTeam
            | LobbyEvent::BadTeam
            | LobbyEvent::BadConnection => {
                debug!(%event, "unsupported lobby message ignored");
                Ok(())
            }
            _ => Err(LobbyError::UnexpectedMessage {
                event,
                state: lobby.state(),
            }),
        }
    }

    fn finished_loading_world(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        if lobby.state() != LobbyState::Loading || self.world_loaded {
            return Ok(());
        }
        self.world_loaded = true;
        self.send(&messages::bare(LobbyEvent::ClientLoadedWorld))?;
        debug!("world loaded, server notified");
        Ok(())
    }

    /// During voting: whether every listed player has a vote on record.
    /// A client never decides phase changes with this; it is for display.
    fn all_players_ready(&self, lobby: &LobbyBase) -> bool {
        lobby.state() == LobbyState::Voting
            && !self.players.is_empty()
            && lobby.with_votes(|votes| self.players.iter().all(|p| votes.contains(p.host_id)))
    }

    fn is_racing(&self, lobby: &LobbyBase) -> bool {
        lobby.state() == LobbyState::Racing
    }

    fn remote_players(&self) -> Vec<NetworkPlayerProfile> {
        self.remote.clone()
    }

    fn host_disconnected(&mut self, lobby: &LobbyBase, host: HostId) -> Result<(), LobbyError> {
        if host == self.server {
            warn!(server = %host, state = %lobby.state(), "lost connection to server");
            lobby.transition(LobbyState::Terminal)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ClientLobby {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLobby")
            .field("player_name", &self.player_name.to_string_lossy())
            .field("host_id", &self.host_id)
            .field("players", &self.players.len())
            .finish_non_exhaustive()
    }
}

//! The authoritative lobby role.
//!
//! The server admits players, decides when each phase ends, fixes the race
//! configuration from the votes, and releases everybody into the race once
//! all worlds are loaded. Clients only ever follow its broadcasts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use kartlobby_protocol::{LobbyEvent, NetworkString, PeerVote, RejectReason, WideString};
use kartlobby_transport::{HostId, Transport};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::messages::{self, KartBinding, LoadWorld, PlayerListEntry};
use crate::{
    LobbyBase, LobbyConfig, LobbyError, LobbyRole, LobbyState, NetworkPlayerProfile, RaceConfig,
};

/// Server side of the lobby.
pub struct ServerLobby {
    config: LobbyConfig,
    transport: Arc<dyn Transport>,
    players: BTreeMap<HostId, NetworkPlayerProfile>,
    next_arrival: u64,
    /// Hosts that sent `CLIENT_LOADED_WORLD` this race.
    loaded: BTreeSet<HostId>,
    server_loaded: bool,
    /// Hosts that sent `RACE_FINISHED_ACK` this race.
    acked: BTreeSet<HostId>,
    /// Latched once voting has been closed for this race.
    voting_closed: bool,
    race_start_requested: bool,
    /// Raised by the race-start worker after `START_RACE` went out.
    race_started: Arc<AtomicBool>,
}

impl ServerLobby {
    /// A server with an empty roster. `config` is validated first.
    pub fn new(config: LobbyConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: config.validated(),
            transport,
            players: BTreeMap::new(),
            next_arrival: 0,
            loaded: BTreeSet::new(),
            server_loaded: false,
            acked: BTreeSet::new(),
            voting_closed: false,
            race_start_requested: false,
            race_started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The validated settings.
    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    /// Admitted players in arrival order.
    pub fn players(&self) -> Vec<&NetworkPlayerProfile> {
        let mut players: Vec<_> = self.players.values().collect();
        players.sort_by_key(|p| p.arrival);
        players
    }

    /// Number of admitted players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if `host` is on the roster.
    pub fn has_player(&self, host: HostId) -> bool {
        self.players.contains_key(&host)
    }

    // -- operations driven by the host application --

    /// Closes admission and sends everybody to kart selection.
    pub fn start_selection(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        if self.players.is_empty() {
            debug!("start_selection with no players, ignored");
            return Ok(());
        }
        lobby.transition(LobbyState::Selection)?;
        self.broadcast(&messages::start_selection(self.config.voting_window_ms()));
        info!(players = self.players.len(), "kart selection started");
        Ok(())
    }

    /// The race simulation reported the end of the race.
    pub fn race_finished(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        lobby.transition(LobbyState::Result)?;
        self.acked.clear();
        self.broadcast(&messages::bare(LobbyEvent::RaceFinished));
        info!("race finished");
        Ok(())
    }

    /// Leaves the result screen without waiting for every acknowledgement.
    pub fn exit_result(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        if lobby.state() != LobbyState::Result {
            return Err(LobbyError::InvalidTransition {
                from: lobby.state(),
                to: LobbyState::Init,
            });
        }
        self.broadcast(&messages::bare(LobbyEvent::ExitResult));
        self.reset(lobby)?;
        self.setup(lobby)
    }

    // -- message handlers --

    fn handle_connection_request(
        &mut self,
        lobby: &LobbyBase,
        from: HostId,
        msg: &mut NetworkString,
    ) -> Result<(), LobbyError> {
        let name = msg.decode_wstring()?;

        if self.players.contains_key(&from) {
            debug!(%from, "duplicate connection request ignored");
            return Ok(());
        }

        let rejection = if lobby.state() != LobbyState::Accepting {
            Some(RejectReason::Busy)
        } else if self.players.len() >= self.config.max_players {
            Some(RejectReason::TooManyPlayers)
        } else if name.to_string_lossy().trim().is_empty() {
            Some(RejectReason::InvalidPlayer)
        } else {
            None
        };

        if let Some(reason) = rejection {
            info!(%from, %reason, "connection refused");
            self.transport
                .send_to(from, messages::connection_refused(reason).as_bytes())?;
            if let Err(e) = self.transport.disconnect(from) {
                debug!(%from, error = %e, "refused host already gone");
            }
            return Ok(());
        }

        let arrival = self.next_arrival;
        self.next_arrival += 1;
        info!(%from, name = %name, arrival, "player accepted");
        self.players
            .insert(from, NetworkPlayerProfile::new(from, name, arrival));

        self.transport
            .send_to(from, messages::connection_accepted(from).as_bytes())?;
        self.broadcast_player_list()
    }

    fn handle_kart_selection(
        &mut self,
        lobby: &LobbyBase,
        from: HostId,
        msg: &mut NetworkString,
    ) -> Result<(), LobbyError> {
        let kart = msg.decode_string()?;
        expect_state(lobby, LobbyEvent::KartSelection, &[LobbyState::Selection])?;
        let player = self
            .players
            .get_mut(&from)
            .ok_or(LobbyError::UnknownHost(from))?;

        debug!(%from, kart = %kart, "kart selected");
        player.kart = Some(kart);
        self.check_selection_complete(lobby)
    }

    fn handle_vote(
        &mut self,
        lobby: &LobbyBase,
        from: HostId,
        msg: &mut NetworkString,
    ) -> Result<(), LobbyError> {
        let vote: PeerVote = msg.decode().map_err(LobbyError::MalformedVote)?;
        if !self.players.contains_key(&from) {
            return Err(LobbyError::VoteFromUnknownHost(from));
        }
        if !lobby.state().accepts_votes() || self.voting_closed {
            return Err(LobbyError::UnexpectedMessage {
                event: LobbyEvent::Vote,
                state: lobby.state(),
            });
        }

        let relay = messages::relayed_vote(from, &vote)?;
        lobby.add_vote(from, vote);
        self.broadcast(&relay);
        Ok(())
    }

    fn handle_client_loaded(&mut self, lobby: &LobbyBase, from: HostId) -> Result<(), LobbyError> {
        expect_state(lobby, LobbyEvent::ClientLoadedWorld, &[LobbyState::Loading])?;
        if !self.players.contains_key(&from) {
            return Err(LobbyError::UnknownHost(from));
        }
        self.loaded.insert(from);
        debug!(
            %from,
            loaded = self.loaded.len(),
            players = self.players.len(),
            "client loaded world"
        );
        self.maybe_start_race(lobby)
    }

    fn handle_race_finished_ack(&mut self, lobby: &LobbyBase, from: HostId) -> Result<(), LobbyError> {
        expect_state(lobby, LobbyEvent::RaceFinishedAck, &[LobbyState::Result])?;
        if !self.players.contains_key(&from) {
            return Err(LobbyError::UnknownHost(from));
        }
        self.acked.insert(from);
        self.check_results_acknowledged(lobby)
    }

    fn handle_chat(&mut self, from: HostId, msg: &mut NetworkString) -> Result<(), LobbyError> {
        let text = msg.decode_wstring()?;
        let player = self.players.get(&from).ok_or(LobbyError::UnknownHost(from))?;

        let mut line = player.name.clone();
        line.push_wide(&WideString::from(": "));
        line.push_wide(&text);
        self.broadcast(&messages::chat(&line)?);
        Ok(())
    }

    // -- phase changes --

    fn check_selection_complete(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        if lobby.state() != LobbyState::Selection || !self.all_players_ready(lobby) {
            return Ok(());
        }
        lobby.transition(LobbyState::Voting)?;
        lobby.start_voting_period(self.config.voting_timeout);
        info!(window_secs = self.config.voting_timeout, "voting started");
        Ok(())
    }

    fn close_voting(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        self.voting_closed = true;
        let votes = lobby.number_of_votes();
        let race = lobby.tally_votes().unwrap_or_else(|| self.pick_default_race());
        info!(
            track = %race.track,
            laps = race.laps,
            reverse = race.reverse,
            votes,
            "voting closed"
        );

        lobby.clear_votes();
        lobby.game_setup_mut().set_race(race.clone());
        lobby.transition(LobbyState::Loading)?;
        self.load_world(lobby)?;

        let karts = lobby
            .game_setup()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .karts()
            .iter()
            .map(KartBinding::from)
            .collect();
        self.broadcast(&messages::load_world(&LoadWorld { race, karts })?);
        Ok(())
    }

    fn pick_default_race(&self) -> RaceConfig {
        let tracks = &self.config.tracks;
        let track = if tracks.is_empty() {
            String::new()
        } else {
            tracks[rand::rng().random_range(0..tracks.len())].clone()
        };
        debug!(track = %track, "nobody voted, picked a track");
        RaceConfig::new(track, self.config.default_laps, false)
    }

    fn maybe_start_race(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        if lobby.state() != LobbyState::Loading
            || self.race_start_requested
            || !self.server_loaded
            || !self.all_players_ready(lobby)
        {
            return Ok(());
        }
        self.race_start_requested = true;

        let transport = Arc::clone(&self.transport);
        let started = Arc::clone(&self.race_started);
        let hosts: Vec<HostId> = self.players.keys().copied().collect();
        let delay = self.config.start_race_delay();
        lobby.spawn_start_game_worker(move || {
            std::thread::sleep(delay);
            send_to_all(transport.as_ref(), hosts, &messages::bare(LobbyEvent::StartRace));
            started.store(true, Ordering::Release);
        })?;
        info!(delay_ms = delay.as_millis() as u64, "all worlds loaded, race starting");
        Ok(())
    }

    fn check_results_acknowledged(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        if lobby.state() == LobbyState::Result && self.all_players_ready(lobby) {
            info!("every player acknowledged the results");
            self.exit_result(lobby)?;
        }
        Ok(())
    }

    /// Back to `Init` with per-race state cleared. The roster stays.
    fn reset(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        lobby.join_start_game_worker()?;
        lobby.transition(LobbyState::Init)?;
        lobby.game_setup_mut().reset();
        for player in self.players.values_mut() {
            player.kart = None;
        }
        self.loaded.clear();
        self.acked.clear();
        self.server_loaded = false;
        self.voting_closed = false;
        self.race_start_requested = false;
        self.race_started.store(false, Ordering::Release);
        Ok(())
    }

    // -- sending --

    /// Sends `msg` to every admitted player. Linked hosts that were never
    /// admitted hear nothing but their own refusal.
    fn broadcast(&self, msg: &NetworkString) {
        send_to_all(self.transport.as_ref(), self.players.keys().copied(), msg);
    }

    fn broadcast_player_list(&self) -> Result<(), LobbyError> {
        let entries: Vec<PlayerListEntry> = self
            .players()
            .into_iter()
            .map(|p| PlayerListEntry {
                host_id: p.host_id,
                name: p.name.clone(),
            })
            .collect();
        self.broadcast(&messages::update_player_list(&entries)?);
        Ok(())
    }
}

/// A host that vanished mid-send is cleaned up by its disconnect event.
fn send_to_all(
    transport: &dyn Transport,
    hosts: impl IntoIterator<Item = HostId>,
    msg: &NetworkString,
) {
    for host in hosts {
        if let Err(e) = transport.send_to(host, msg.as_bytes()) {
            warn!(%host, error = %e, "send to player failed");
        }
    }
}

fn expect_state(
    lobby: &LobbyBase,
    event: LobbyEvent,
    allowed: &[LobbyState],
) -> Result<(), LobbyError> {
    let state = lobby.state();
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(LobbyError::UnexpectedMessage { event, state })
    }
}

impl LobbyRole for ServerLobby {
    fn setup(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        lobby.transition(LobbyState::Accepting)?;
        info!(max_players = self.config.max_players, "server lobby accepting players");
        Ok(())
    }

    fn update(&mut self, lobby: &LobbyBase, _ticks: u32) -> Result<(), LobbyError> {
        match lobby.state() {
            LobbyState::Selection
            | LobbyState::Voting
            | LobbyState::Loading
            | LobbyState::Racing
            | LobbyState::Result
                if self.players.is_empty() =>
            {
                warn!(state = %lobby.state(), "every player left, reopening lobby");
                self.reset(lobby)?;
                self.setup(lobby)
            }
            LobbyState::Voting if !self.voting_closed => {
                if lobby.is_voting_over() || self.all_players_ready(lobby) {
                    self.close_voting(lobby)?;
                }
                Ok(())
            }
            LobbyState::Loading => {
                if self.race_started.load(Ordering::Acquire) {
                    lobby.join_start_game_worker()?;
                    lobby.transition(LobbyState::Racing)?;
                    info!(players = self.players.len(), "race started");
                    Ok(())
                } else {
                    self.maybe_start_race(lobby)
                }
            }
            _ => Ok(()),
        }
    }

    fn handle_event(
        &mut self,
        lobby: &LobbyBase,
        from: HostId,
        event: LobbyEvent,
        msg: &mut NetworkString,
    ) -> Result<(), LobbyError> {
        match event {
            LobbyEvent::ConnectionRequested => self.handle_connection_request(lobby, from, msg),
            LobbyEvent::RequestBegin => {
                if !self.players.contains_key(&from) {
                    return Err(LobbyError::UnknownHost(from));
                }
                expect_state(lobby, event, &[LobbyState::Accepting])?;
                self.start_selection(lobby)
            }
            LobbyEvent::KartSelection => self.handle_kart_selection(lobby, from, msg),
            LobbyEvent::Vote => self.handle_vote(lobby, from, msg),
            LobbyEvent::ClientLoadedWorld => self.handle_client_loaded(lobby, from),
            LobbyEvent::RaceFinishedAck => self.handle_race_finished_ack(lobby, from),
            LobbyEvent::Chat => self.handle_chat(from, msg),
            LobbyEvent::ServerInfo
            | LobbyEvent::ServerOwnership
            | LobbyEvent::KickHost
            | LobbyEvent::ChangeTeam
            | LobbyEvent::BadTeam
            | LobbyEvent::BadConnection => {
                debug!(%from, %event, "unsupported lobby message ignored");
                Ok(())
            }
            _ => Err(LobbyError::UnexpectedMessage {
                event,
                state: lobby.state(),
            }),
        }
    }

    fn finished_loading_world(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        if lobby.state() != LobbyState::Loading {
            debug!(state = %lobby.state(), "world loaded outside Loading, ignored");
            return Ok(());
        }
        self.server_loaded = true;
        debug!("server world loaded");
        self.maybe_start_race(lobby)
    }

    /// Whether every admitted player has done what the current phase
    /// waits for: picked a kart, voted, loaded, or acknowledged results.
    fn all_players_ready(&self, lobby: &LobbyBase) -> bool {
        if self.players.is_empty() {
            return false;
        }
        match lobby.state() {
            LobbyState::Selection => self.players.values().all(|p| p.kart.is_some()),
            LobbyState::Voting => {
                lobby.with_votes(|votes| self.players.keys().all(|host| votes.contains(*host)))
            }
            LobbyState::Loading => self.players.keys().all(|host| self.loaded.contains(host)),
            LobbyState::Result => self.players.keys().all(|host| self.acked.contains(host)),
            _ => false,
        }
    }

    fn is_racing(&self, lobby: &LobbyBase) -> bool {
        lobby.state() == LobbyState::Racing
    }

    fn remote_players(&self) -> Vec<NetworkPlayerProfile> {
        self.players()
            .into_iter()
            .map(|p| NetworkPlayerProfile {
                kart: p.kart.clone().or_else(|| Some(self.config.default_kart.clone())),
                ..p.clone()
            })
            .collect()
    }

    fn host_disconnected(&mut self, lobby: &LobbyBase, host: HostId) -> Result<(), LobbyError> {
        let Some(player) = self.players.remove(&host) else {
            return Ok(());
        };
        info!(%host, name = %player.name, players = self.players.len(), "player left");

        lobby.remove_vote(host);
        self.loaded.remove(&host);
        self.acked.remove(&host);

        self.broadcast(&messages::player_disconnected(host));
        self.broadcast_player_list()?;

        match lobby.state() {
            LobbyState::Selection => self.check_selection_complete(lobby),
            LobbyState::Loading => self.maybe_start_race(lobby),
            LobbyState::Result => self.check_results_acknowledged(lobby),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for ServerLobby {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLobby")
            .field("players", &self.players.len())
            .field("voting_closed", &self.voting_closed)
            .field("race_start_requested", &self.race_start_requested)
            .finish_non_exhaustive()
    }
}

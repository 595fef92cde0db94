//! Role-agnostic lobby state: voting window, votes, game setup, and the
//! race-start worker.
//!
//! Everything here is safe to call from any thread. The voting deadline is
//! a lock-free atomic read; the vote map and worker handle sit behind
//! short-lived mutexes.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLockWriteGuard};
use std::thread::JoinHandle;

use kartlobby_protocol::PeerVote;
use kartlobby_tick::{Clock, SystemClock, VotingTimer};
use kartlobby_transport::HostId;
use tracing::{debug, info};

use crate::{
    GameSetup, GameSetupHandle, LobbyError, LobbyState, NetworkPlayerProfile, NullWorldLoader,
    RaceConfig, RemoteKart, VoteSet, WorldLoader,
};

/// State and services every lobby role shares.
pub struct LobbyBase {
    state: AtomicU8,
    voting: VotingTimer,
    votes: Mutex<VoteSet>,
    game_setup: GameSetupHandle,
    loader: Arc<dyn WorldLoader>,
    start_game_worker: Mutex<Option<JoinHandle<()>>>,
    karts_configured: AtomicBool,
    unknown_opcodes: AtomicU64,
}

impl LobbyBase {
    /// A base in [`LobbyState::Init`] reading time from `clock`.
    pub fn new(game_setup: GameSetupHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: AtomicU8::new(LobbyState::Init.into()),
            voting: VotingTimer::new(clock),
            votes: Mutex::new(VoteSet::new()),
            game_setup,
            loader: Arc::new(NullWorldLoader),
            start_game_worker: Mutex::new(None),
            karts_configured: AtomicBool::new(false),
            unknown_opcodes: AtomicU64::new(0),
        }
    }

    /// A base on the system monotonic clock.
    pub fn with_system_clock(game_setup: GameSetupHandle) -> Self {
        Self::new(game_setup, Arc::new(SystemClock::new()))
    }

    /// Replaces the engine hook notified by [`load_world`](Self::load_world).
    pub fn with_loader(mut self, loader: Arc<dyn WorldLoader>) -> Self {
        self.loader = loader;
        self
    }

    // -- state machine --

    /// Current state of the race cycle.
    pub fn state(&self) -> LobbyState {
        LobbyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves to `to` if the state machine allows it.
    pub fn transition(&self, to: LobbyState) -> Result<(), LobbyError> {
        let from = self.state();
        if !from.can_transition_to(to) {
            return Err(LobbyError::InvalidTransition { from, to });
        }
        self.state.store(to.into(), Ordering::Release);
        if to == LobbyState::Init {
            self.reset_for_next_race();
        }
        info!(%from, %to, "lobby state changed");
        Ok(())
    }

    /// Unconditionally enters [`LobbyState::Terminal`].
    pub(crate) fn terminate(&self) {
        let previous = self
            .state
            .swap(LobbyState::Terminal.into(), Ordering::AcqRel);
        let from = LobbyState::from_u8(previous);
        if from != LobbyState::Terminal {
            debug!(%from, "lobby terminating");
        }
    }

    // -- voting window --

    /// Opens (or restarts) a voting period of `seconds`.
    pub fn start_voting_period(&self, seconds: f32) {
        self.voting.start(seconds);
        debug!(seconds, deadline_ms = self.voting.deadline_ms(), "voting period started");
    }

    /// Seconds left in the voting period, never negative.
    pub fn remaining_voting_time(&self) -> f32 {
        self.voting.remaining()
    }

    /// `true` once the deadline has passed, and before any period started.
    pub fn is_voting_over(&self) -> bool {
        self.voting.is_over()
    }

    /// Length of the current voting period in seconds.
    pub fn max_voting_time(&self) -> f32 {
        self.voting.max_time()
    }

    // -- votes --

    /// Number of hosts that have voted this race.
    pub fn number_of_votes(&self) -> usize {
        self.votes().count()
    }

    /// Records a vote, replacing any earlier one from `host`.
    pub fn add_vote(&self, host: HostId, vote: PeerVote) {
        debug!(
            %host,
            track = %vote.track_name,
            laps = vote.num_laps,
            reverse = vote.reverse,
            "vote recorded"
        );
        self.votes().add(host, vote);
    }

    /// A copy of `host`'s vote, if any.
    pub fn vote(&self, host: HostId) -> Option<PeerVote> {
        self.votes().get(host).cloned()
    }

    /// Drops the vote of `host`, for example when it leaves.
    pub fn remove_vote(&self, host: HostId) -> Option<PeerVote> {
        self.votes().remove(host)
    }

    /// Runs `f` with the vote map locked.
    pub fn with_votes<T>(&self, f: impl FnOnce(&VoteSet) -> T) -> T {
        f(&*self.votes())
    }

    /// See [`VoteSet::tally`].
    pub fn tally_votes(&self) -> Option<RaceConfig> {
        self.votes().tally()
    }

    /// Forgets every vote.
    pub fn clear_votes(&self) {
        self.votes().clear();
    }

    fn votes(&self) -> MutexGuard<'_, VoteSet> {
        self.votes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- game setup and world loading --

    /// The race description shared with the engine.
    pub fn game_setup(&self) -> &GameSetupHandle {
        &self.game_setup
    }

    pub(crate) fn game_setup_mut(&self) -> RwLockWriteGuard<'_, GameSetup> {
        self.game_setup.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `players` to kart slots 0, 1, 2, ... in the order given.
    ///
    /// Once per race cycle: a second call before the lobby returns to
    /// [`LobbyState::Init`] fails with [`LobbyError::KartsAlreadyConfigured`].
    pub fn config_remote_kart(&self, players: &[NetworkPlayerProfile]) -> Result<(), LobbyError> {
        if self.karts_configured.swap(true, Ordering::AcqRel) {
            return Err(LobbyError::KartsAlreadyConfigured);
        }

        let karts: Vec<RemoteKart> = players
            .iter()
            .enumerate()
            .map(|(slot, player)| RemoteKart {
                slot,
                host_id: player.host_id,
                player_name: player.name.clone(),
                kart: player.kart.clone().unwrap_or_default(),
            })
            .collect();

        debug!(karts = karts.len(), "remote karts configured");
        self.game_setup_mut().set_karts(karts);
        Ok(())
    }

    /// Binds kart slots, then asks the engine to start loading.
    pub fn load_world(&self, players: &[NetworkPlayerProfile]) -> Result<(), LobbyError> {
        self.config_remote_kart(players)?;
        let setup = self.game_setup.read().unwrap_or_else(PoisonError::into_inner);
        self.loader.begin_loading(&setup);
        Ok(())
    }

    // -- race-start worker --

    /// Runs `job` on a background thread named `start-game`.
    ///
    /// Joins any previous worker first. The new worker is joined by
    /// [`join_start_game_worker`](Self::join_start_game_worker) or on drop.
    pub fn spawn_start_game_worker<F>(&self, job: F) -> Result<(), LobbyError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.join_start_game_worker()?;
        let handle = std::thread::Builder::new()
            .name("start-game".to_owned())
            .spawn(job)
            .map_err(LobbyError::WorkerSpawn)?;
        *self.worker() = Some(handle);
        debug!("race-start worker spawned");
        Ok(())
    }

    /// `true` while a worker has been spawned and not yet joined.
    pub fn has_start_game_worker(&self) -> bool {
        self.worker().is_some()
    }

    /// Blocks until the pending worker (if any) finishes. No-op otherwise.
    pub fn join_start_game_worker(&self) -> Result<(), LobbyError> {
        let Some(handle) = self.worker().take() else {
            return Ok(());
        };
        handle.join().map_err(|_| LobbyError::WorkerPanicked)?;
        debug!("race-start worker joined");
        Ok(())
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.start_game_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // -- bookkeeping --

    /// Messages dropped because their opcode was not in the catalog.
    pub fn unknown_opcodes(&self) -> u64 {
        self.unknown_opcodes.load(Ordering::Relaxed)
    }

    pub(crate) fn record_unknown_opcode(&self) {
        self.unknown_opcodes.fetch_add(1, Ordering::Relaxed);
    }

    fn reset_for_next_race(&self) {
        self.karts_configured.store(false, Ordering::Release);
        self.clear_votes();
    }
}

impl Drop for LobbyBase {
    fn drop(&mut self) {
        if let Err(e) = self.join_start_game_worker() {
            tracing::error!(error = %e, "race-start worker failed");
        }
    }
}

impl std::fmt::Debug for LobbyBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobbyBase")
            .field("state", &self.state())
            .field("voting", &self.voting)
            .field("votes", &self.number_of_votes())
            .field("worker_pending", &self.has_start_game_worker())
            .finish_non_exhaustive()
    }
}

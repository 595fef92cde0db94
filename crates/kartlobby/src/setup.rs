//! Race setup shared between the lobby and the race engine.
//!
//! The lobby only writes here: the chosen [`RaceConfig`] and the kart slot
//! bindings. The engine (behind [`WorldLoader`]) reads it to build the
//! world.

use std::sync::{Arc, RwLock};

use kartlobby_protocol::WideString;
use kartlobby_transport::HostId;
use serde::{Deserialize, Serialize};

/// Track, lap count and direction of a race.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaceConfig {
    pub track: String,
    pub laps: u8,
    pub reverse: bool,
}

impl RaceConfig {
    /// A race on `track`.
    pub fn new(track: impl Into<String>, laps: u8, reverse: bool) -> Self {
        Self {
            track: track.into(),
            laps,
            reverse,
        }
    }
}

/// A player as the lobby knows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlayerProfile {
    pub host_id: HostId,
    pub name: WideString,
    /// `None` until the player sends `KART_SELECTION`.
    pub kart: Option<String>,
    /// Join sequence number; lower joined earlier.
    pub arrival: u64,
}

impl NetworkPlayerProfile {
    /// A player with no kart chosen yet.
    pub fn new(host_id: HostId, name: impl Into<WideString>, arrival: u64) -> Self {
        Self {
            host_id,
            name: name.into(),
            kart: None,
            arrival,
        }
    }
}

/// One kart slot bound to a remote player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteKart {
    pub slot: usize,
    pub host_id: HostId,
    pub player_name: WideString,
    /// Empty lets the engine choose.
    pub kart: String,
}

/// What the next race looks like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameSetup {
    race: Option<RaceConfig>,
    karts: Vec<RemoteKart>,
}

/// Shared handle to the game setup. Owned by the layer above the lobby.
pub type GameSetupHandle = Arc<RwLock<GameSetup>>;

impl GameSetup {
    /// A fresh, empty setup behind a shared handle.
    pub fn shared() -> GameSetupHandle {
        Arc::new(RwLock::new(Self::default()))
    }

    /// The race picked for this cycle, if voting closed.
    pub fn race(&self) -> Option<&RaceConfig> {
        self.race.as_ref()
    }

    /// Fixes the race for this cycle.
    pub fn set_race(&mut self, race: RaceConfig) {
        self.race = Some(race);
    }

    /// Kart bindings in slot order.
    pub fn karts(&self) -> &[RemoteKart] {
        &self.karts
    }

    /// Replaces the kart bindings.
    pub fn set_karts(&mut self, karts: Vec<RemoteKart>) {
        self.karts = karts;
    }

    /// Forgets the race and the bindings.
    pub fn reset(&mut self) {
        self.race = None;
        self.karts.clear();
    }
}

/// The engine side of world loading.
pub trait WorldLoader: Send + Sync + 'static {
    /// Starts loading the world described by `setup`. Completion is
    /// reported back through `finished_loading_world`.
    fn begin_loading(&self, setup: &GameSetup);
}

/// A loader that only logs. For headless lobbies and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWorldLoader;

impl WorldLoader for NullWorldLoader {
    fn begin_loading(&self, setup: &GameSetup) {
        tracing::debug!(
            track = setup.race().map(|r| r.track.as_str()).unwrap_or(""),
            karts = setup.karts().len(),
            "world load requested"
        );
    }
}

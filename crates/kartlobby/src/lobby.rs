//! The active lobby: one [`LobbyBase`] plus one [`LobbyRole`].
//!
//! A process has at most one registered lobby. The registry holds only a
//! `Weak` reference, so the lobby lives exactly as long as its owners'
//! `Arc`s; the last drop terminates it, joins the race-start worker and
//! frees the slot for the next [`Lobby::create`].

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use kartlobby_protocol::NetworkString;
use kartlobby_transport::HostId;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{LobbyBase, LobbyError, LobbyRole, LobbyState, RaceConfig};

type ActiveSlot = Option<Weak<dyn Any + Send + Sync>>;

/// The process-wide registration of the active lobby.
static ACTIVE_LOBBY: Mutex<ActiveSlot> = Mutex::new(None);

fn active_slot() -> MutexGuard<'static, ActiveSlot> {
    ACTIVE_LOBBY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns `true` while a registered lobby is alive.
pub fn lobby_is_active() -> bool {
    active_slot().is_some()
}

/// A point-in-time view of a lobby, for logs and status pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LobbySnapshot {
    pub state: LobbyState,
    pub remaining_voting_time: f32,
    pub max_voting_time: f32,
    pub votes: usize,
    pub race: Option<RaceConfig>,
    pub karts: usize,
    pub unknown_opcodes: u64,
}

/// A lobby with role `R`.
pub struct Lobby<R: LobbyRole> {
    base: LobbyBase,
    role: Mutex<R>,
    registered: bool,
}

impl<R: LobbyRole> Lobby<R> {
    /// Creates the process's lobby and registers it.
    ///
    /// # Errors
    /// [`LobbyError::AlreadyActive`] while another registered lobby is
    /// alive, whatever its role.
    pub fn create(role: R, base: LobbyBase) -> Result<Arc<Self>, LobbyError> {
        let mut slot = active_slot();
        if slot.is_some() {
            error!("lobby already active, refusing to create another");
            return Err(LobbyError::AlreadyActive);
        }

        let lobby = Arc::new(Self {
            base,
            role: Mutex::new(role),
            registered: true,
        });
        let weak: Weak<Self> = Arc::downgrade(&lobby);
        *slot = Some(weak as Weak<dyn Any + Send + Sync>);

        info!(role = std::any::type_name::<R>(), "lobby created");
        Ok(lobby)
    }

    /// Creates a lobby that is not registered: [`get`](Self::get) never
    /// returns it and it does not block [`create`](Self::create).
    ///
    /// For bots and tests that run several peers in one process.
    pub fn detached(role: R, base: LobbyBase) -> Arc<Self> {
        debug!(role = std::any::type_name::<R>(), "detached lobby created");
        Arc::new(Self {
            base,
            role: Mutex::new(role),
            registered: false,
        })
    }

    /// The registered lobby, if one is alive and its role is `R`.
    pub fn get() -> Option<Arc<Self>> {
        let any = active_slot().as_ref().and_then(Weak::upgrade)?;
        any.downcast::<Self>().ok()
    }

    /// The shared state behind the role.
    pub fn base(&self) -> &LobbyBase {
        &self.base
    }

    /// Current state of the race cycle.
    pub fn state(&self) -> LobbyState {
        self.base.state()
    }

    /// Runs `f` with exclusive access to the role, for role-specific
    /// operations such as a client casting its vote.
    pub fn with_role<T>(&self, f: impl FnOnce(&mut R, &LobbyBase) -> T) -> T {
        f(&mut *self.role(), &self.base)
    }

    fn role(&self) -> MutexGuard<'_, R> {
        self.role.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- role hooks --

    /// See [`LobbyRole::setup`].
    pub fn setup(&self) -> Result<(), LobbyError> {
        self.role().setup(&self.base)
    }

    /// See [`LobbyRole::update`].
    pub fn update(&self, ticks: u32) -> Result<(), LobbyError> {
        self.role().update(&self.base, ticks)
    }

    /// Decodes and dispatches one message from `from`.
    ///
    /// Failures are logged here. Unknown opcodes also bump
    /// [`LobbyBase::unknown_opcodes`].
    pub fn handle_message(&self, from: HostId, data: &[u8]) -> Result<(), LobbyError> {
        let result = self.dispatch(from, data);
        if let Err(e) = &result {
            match e {
                LobbyError::UnknownOpcode(op) => {
                    self.base.record_unknown_opcode();
                    warn!(%from, opcode = *op, "unknown opcode, message dropped");
                }
                LobbyError::MalformedVote(_) | LobbyError::VoteFromUnknownHost(_) => {
                    warn!(%from, error = %e, "vote rejected");
                }
                e if e.is_message_error() => {
                    debug!(%from, error = %e, "message dropped");
                }
                e => error!(%from, error = %e, "message handling failed"),
            }
        }
        result
    }

    fn dispatch(&self, from: HostId, data: &[u8]) -> Result<(), LobbyError> {
        let mut msg = NetworkString::from_bytes(data);
        let event = msg.read_event().map_err(LobbyError::from_opcode)?;
        debug!(%from, %event, len = data.len(), "message received");
        self.role().handle_event(&self.base, from, event, &mut msg)
    }

    /// Tells the role the transport lost `host`.
    pub fn host_disconnected(&self, host: HostId) -> Result<(), LobbyError> {
        self.role().host_disconnected(&self.base, host)
    }

    /// See [`LobbyRole::load_world`].
    pub fn load_world(&self) -> Result<(), LobbyError> {
        self.role().load_world(&self.base)
    }

    /// Reports that the local world finished loading.
    pub fn finished_loading_world(&self) -> Result<(), LobbyError> {
        self.role().finished_loading_world(&self.base)
    }

    pub fn all_players_ready(&self) -> bool {
        self.role().all_players_ready(&self.base)
    }

    pub fn is_racing(&self) -> bool {
        self.role().is_racing(&self.base)
    }

    /// Captures the lobby's current state.
    pub fn snapshot(&self) -> LobbySnapshot {
        let setup = self
            .base
            .game_setup()
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        LobbySnapshot {
            state: self.base.state(),
            remaining_voting_time: self.base.remaining_voting_time(),
            max_voting_time: self.base.max_voting_time(),
            votes: self.base.number_of_votes(),
            race: setup.race().cloned(),
            karts: setup.karts().len(),
            unknown_opcodes: self.base.unknown_opcodes(),
        }
    }
}

impl<R: LobbyRole> Drop for Lobby<R> {
    fn drop(&mut self) {
        self.base.terminate();
        if let Err(e) = self.base.join_start_game_worker() {
            error!(error = %e, "race-start worker failed");
        }

        if self.registered {
            let mut slot = active_slot();
            let is_self = slot
                .as_ref()
                .is_some_and(|weak| std::ptr::addr_eq(weak.as_ptr(), self as *const Self));
            if is_self {
                *slot = None;
            }
        }
        info!(role = std::any::type_name::<R>(), "lobby destroyed");
    }
}

impl<R: LobbyRole> std::fmt::Debug for Lobby<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lobby")
            .field("role", &std::any::type_name::<R>())
            .field("base", &self.base)
            .field("registered", &self.registered)
            .finish()
    }
}

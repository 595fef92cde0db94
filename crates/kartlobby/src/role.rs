//! The `LobbyRole` trait: what makes a lobby a server or a client.
//!
//! [`Lobby`](crate::Lobby) owns the shared [`LobbyBase`] and one role. It
//! decodes the opcode of every incoming message and hands the rest to the
//! role; the role drives the state machine through the base.

use kartlobby_protocol::{LobbyEvent, NetworkString};
use kartlobby_transport::HostId;

use crate::{LobbyBase, LobbyError, NetworkPlayerProfile};

/// Role-specific lobby behavior.
///
/// Every hook receives the shared base. Hooks run one at a time: the
/// owning [`Lobby`](crate::Lobby) serializes them behind a mutex.
pub trait LobbyRole: Send + 'static {
    /// Moves the lobby out of [`LobbyState::Init`](crate::LobbyState::Init).
    ///
    /// Called once after creation and again after every race.
    fn setup(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError>;

    /// Periodic work. `ticks` is how many scheduler ticks elapsed since
    /// the previous call.
    fn update(&mut self, lobby: &LobbyBase, ticks: u32) -> Result<(), LobbyError>;

    /// Handles one message whose opcode has already been read from `msg`.
    fn handle_event(
        &mut self,
        lobby: &LobbyBase,
        from: HostId,
        event: LobbyEvent,
        msg: &mut NetworkString,
    ) -> Result<(), LobbyError>;

    /// The local engine finished loading the world.
    fn finished_loading_world(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError>;

    /// Whether everybody this role waits on is ready for the next phase.
    fn all_players_ready(&self, lobby: &LobbyBase) -> bool;

    fn is_racing(&self, lobby: &LobbyBase) -> bool;

    /// Remote players in kart slot order.
    fn remote_players(&self) -> Vec<NetworkPlayerProfile>;

    /// Binds kart slots and starts loading. Default: the base's behavior
    /// for [`remote_players`](Self::remote_players).
    fn load_world(&mut self, lobby: &LobbyBase) -> Result<(), LobbyError> {
        lobby.load_world(&self.remote_players())
    }

    /// The transport lost `host`. Default: nothing to clean up.
    fn host_disconnected(&mut self, _lobby: &LobbyBase, _host: HostId) -> Result<(), LobbyError> {
        Ok(())
    }
}

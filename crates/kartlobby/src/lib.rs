//! The kart race lobby.
//!
//! A lobby is where a server and its clients agree on a race: who plays,
//! which kart each drives, and which track (by vote) before everybody
//! loads the world and starts together.
//!
//! # Key types
//!
//! - [`Lobby`]: the active lobby, at most one registered per process
//! - [`LobbyBase`]: state shared by every role (voting window, votes,
//!   game setup, race-start worker)
//! - [`LobbyRole`]: the trait behind [`ServerLobby`] and [`ClientLobby`]
//! - [`VoteSet`]: per-race votes and the tally
//! - [`LobbyState`]: the race-cycle state machine
//! - [`LobbyConfig`]: server settings
//! - [`spawn_driver`]: runs a lobby on a Tokio task

mod base;
mod client;
mod config;
mod driver;
mod error;
mod lobby;
pub mod messages;
mod role;
mod server;
mod setup;
mod votes;

pub use base::LobbyBase;
pub use client::ClientLobby;
pub use config::{LobbyConfig, LobbyState};
pub use driver::{DriverHandle, spawn_driver};
pub use error::LobbyError;
pub use lobby::{Lobby, LobbySnapshot, lobby_is_active};
pub use role::LobbyRole;
pub use server::ServerLobby;
pub use setup::{
    GameSetup, GameSetupHandle, NetworkPlayerProfile, NullWorldLoader, RaceConfig, RemoteKart,
    WorldLoader,
};
pub use votes::VoteSet;

/// Re-exports for applications embedding a lobby.
pub mod prelude {
    pub use crate::{
        ClientLobby, GameSetup, Lobby, LobbyBase, LobbyConfig, LobbyError, LobbyRole, LobbyState,
        ServerLobby, spawn_driver,
    };
    pub use kartlobby_protocol::{LobbyEvent, PeerVote, RejectReason, WideString};
    pub use kartlobby_tick::{Clock, SystemClock, TickConfig, TickScheduler};
    pub use kartlobby_transport::{ChannelTransport, HostId, Transport, TransportEvent};
}

//! The lobby message catalog.
//!
//! Opcode values and their order are part of the wire contract shared by
//! every server and client build. Never reorder or renumber these; new
//! opcodes go at the end.

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// LobbyEvent
// ---------------------------------------------------------------------------

/// First byte of every lobby message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LobbyEvent {
    /// Client asks the server for a slot.
    ConnectionRequested = 1,
    /// Server refuses the connection, with a [`RejectReason`].
    ConnectionRefused,
    /// Server accepts the connection.
    ConnectionAccepted,
    /// Server describes itself to a client.
    ServerInfo,
    /// Client asks the server to begin kart selection.
    RequestBegin,
    /// Server pushes the current player list.
    UpdatePlayerList,
    /// Client picked a kart.
    KartSelection,
    /// A peer left.
    PlayerDisconnected,
    /// Client finished loading the world.
    ClientLoadedWorld,
    /// Clients should load the world.
    LoadWorld,
    /// Server tells clients the race starts.
    StartRace,
    /// Server opens kart and track selection.
    StartSelection,
    /// Race has finished, show results.
    RaceFinished,
    /// Client went back to the lobby from the result screen.
    RaceFinishedAck,
    /// Server forces clients off the result screen.
    ExitResult,
    /// Track vote.
    Vote,
    /// Chat line.
    Chat,
    /// Ownership of the server changed hands.
    ServerOwnership,
    /// Owner kicks a host.
    KickHost,
    /// Player switches team.
    ChangeTeam,
    /// Teams are unbalanced.
    BadTeam,
    /// Connection quality too poor to race.
    BadConnection,
}

impl LobbyEvent {
    /// Every opcode, in wire order.
    pub const ALL: [LobbyEvent; 22] = [
        Self::ConnectionRequested,
        Self::ConnectionRefused,
        Self::ConnectionAccepted,
        Self::ServerInfo,
        Self::RequestBegin,
        Self::UpdatePlayerList,
        Self::KartSelection,
        Self::PlayerDisconnected,
        Self::ClientLoadedWorld,
        Self::LoadWorld,
        Self::StartRace,
        Self::StartSelection,
        Self::RaceFinished,
        Self::RaceFinishedAck,
        Self::ExitResult,
        Self::Vote,
        Self::Chat,
        Self::ServerOwnership,
        Self::KickHost,
        Self::ChangeTeam,
        Self::BadTeam,
        Self::BadConnection,
    ];

    /// Symbolic name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::ConnectionRequested => "CONNECTION_REQUESTED",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::ConnectionAccepted => "CONNECTION_ACCEPTED",
            Self::ServerInfo => "SERVER_INFO",
            Self::RequestBegin => "REQUEST_BEGIN",
            Self::UpdatePlayerList => "UPDATE_PLAYER_LIST",
            Self::KartSelection => "KART_SELECTION",
            Self::PlayerDisconnected => "PLAYER_DISCONNECTED",
            Self::ClientLoadedWorld => "CLIENT_LOADED_WORLD",
            Self::LoadWorld => "LOAD_WORLD",
            Self::StartRace => "START_RACE",
            Self::StartSelection => "START_SELECTION",
            Self::RaceFinished => "RACE_FINISHED",
            Self::RaceFinishedAck => "RACE_FINISHED_ACK",
            Self::ExitResult => "EXIT_RESULT",
            Self::Vote => "VOTE",
            Self::Chat => "CHAT",
            Self::ServerOwnership => "SERVER_OWNERSHIP",
            Self::KickHost => "KICK_HOST",
            Self::ChangeTeam => "CHANGE_TEAM",
            Self::BadTeam => "BAD_TEAM",
            Self::BadConnection => "BAD_CONNECTION",
        }
    }
}

impl From<LobbyEvent> for u8 {
    fn from(event: LobbyEvent) -> u8 {
        event as u8
    }
}

impl TryFrom<u8> for LobbyEvent {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|event| *event as u8 == raw)
            .ok_or(ProtocolError::UnknownOpcode(raw))
    }
}

impl fmt::Display for LobbyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// RejectReason
// ---------------------------------------------------------------------------

/// Why the server refused a connection. Carried by `CONNECTION_REFUSED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RejectReason {
    /// The lobby is not accepting players right now.
    Busy = 0,
    Banned = 1,
    IncorrectPassword = 2,
    IncompatibleData = 3,
    TooManyPlayers = 4,
    /// The requested player profile is unusable (e.g. empty name).
    InvalidPlayer = 5,
}

impl RejectReason {
    pub const ALL: [RejectReason; 6] = [
        Self::Busy,
        Self::Banned,
        Self::IncorrectPassword,
        Self::IncompatibleData,
        Self::TooManyPlayers,
        Self::InvalidPlayer,
    ];

    /// The catalog name, as used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Busy => "BUSY",
            Self::Banned => "BANNED",
            Self::IncorrectPassword => "INCORRECT_PASSWORD",
            Self::IncompatibleData => "INCOMPATIBLE_DATA",
            Self::TooManyPlayers => "TOO_MANY_PLAYERS",
            Self::InvalidPlayer => "INVALID_PLAYER",
        }
    }
}

impl From<RejectReason> for u8 {
    fn from(reason: RejectReason) -> u8 {
        reason as u8
    }
}

impl TryFrom<u8> for RejectReason {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|reason| *reason as u8 == raw)
            .ok_or(ProtocolError::UnknownRejectReason(raw))
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =========================================================================
// Tests
// =========================================================================

//! Transport contract for the kart lobby.
//!
//! The lobby never touches sockets. It consumes the [`Transport`] trait:
//! framed byte strings go out through `send_to` / `broadcast`, and come
//! back in as [`TransportEvent`]s tagged with the sending [`HostId`].
//! Framing and reliability are the transport's responsibility.
//!
//! [`ChannelTransport`] is an in-process implementation over Tokio
//! channels, used by the driver tests and the local demo.

mod channel;
mod error;

pub use channel::ChannelTransport;
pub use error::TransportError;

use std::fmt;

/// Identifier the transport assigns to one connected peer.
///
/// Host ids are sparse: peers come and go, and gaps are normal. The lobby
/// uses them as map keys and never assumes they are consecutive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostId(pub i32);

impl HostId {
    /// Host id the server endpoint uses for itself.
    pub const SERVER: HostId = HostId(0);

    /// Reinterprets the id as the unsigned value carried on the wire.
    pub fn to_wire(self) -> u32 {
        self.0 as u32
    }

    /// Inverse of [`to_wire`](Self::to_wire).
    pub fn from_wire(raw: u32) -> Self {
        Self(raw as i32)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host-{}", self.0)
    }
}

/// A framed message received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The peer that sent the message.
    pub from: HostId,
    /// Raw bytes: opcode followed by payload.
    pub data: Vec<u8>,
}

/// Something that happened on the transport, delivered to the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer became reachable.
    Connected(HostId),
    /// A peer sent a message.
    Data(Packet),
    /// A peer went away (closed, kicked, or timed out).
    Disconnected(HostId),
}

/// Send primitives the lobby needs from the network layer.
///
/// Implementations are shared between the game thread, the receive path
/// and the race-start worker, hence `Send + Sync`.
pub trait Transport: Send + Sync + 'static {
    /// The id this endpoint is known by to its peers.
    fn local_id(&self) -> HostId;

    /// Sends a framed message to one peer.
    fn send_to(&self, host: HostId, data: &[u8]) -> Result<(), TransportError>;

    /// Sends a framed message to every connected peer.
    ///
    /// Best effort: a peer whose channel is gone is skipped.
    fn broadcast(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Drops the connection to a peer.
    fn disconnect(&self, host: HostId) -> Result<(), TransportError>;
}

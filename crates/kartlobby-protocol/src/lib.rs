//! Wire protocol for the kart lobby.
//!
//! This crate defines what the server and client lobbies say to each
//! other:
//!
//! - **Catalog** ([`LobbyEvent`], [`RejectReason`]) — the one-byte opcodes
//!   and reject reasons both roles must agree on, bit for bit.
//! - **Codec** ([`NetworkString`], [`WireCodec`]) — the length-prefixed
//!   binary encoding of strings, wide strings and integers.
//! - **Votes** ([`PeerVote`]) — a peer's preferred race configuration.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while decoding.
//!
//! # Framing
//!
//! ```text
//! [u8 opcode][payload ...]
//! string  = [u8 len][len bytes of UTF-8]
//! wstring = [u16 BE len][len x u16 BE code units]
//! ```
//!
//! Splitting bytes into messages is the transport's job; this crate only
//! sees whole messages.

mod codec;
mod error;
mod types;
mod vote;

pub use codec::{NetworkString, WideString, WireCodec};
pub use error::ProtocolError;
pub use types::{LobbyEvent, RejectReason};
pub use vote::PeerVote;

//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes were wrong: a message was cut
//! short, carried an opcode nobody knows, or a string did not fit its
//! length prefix. Callers drop the offending message and move on.

/// Errors that can occur while encoding or decoding lobby messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message had no bytes at all, not even an opcode.
    #[error("empty message")]
    Empty,

    /// A read ran past the end of the message.
    #[error("message truncated: needed {needed} bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    /// The first byte is not a known lobby opcode.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// A `CONNECTION_REFUSED` payload carried an unknown reason.
    #[error("unknown reject reason {0}")]
    UnknownRejectReason(u8),

    /// A string is longer than its length prefix can express.
    #[error("string of length {len} exceeds wire limit {max}")]
    StringTooLong { len: usize, max: usize },

    /// A list has more entries than its one-byte count can express.
    #[error("list of {len} entries exceeds wire limit {max}")]
    ListTooLong { len: usize, max: usize },

    /// A narrow string was not valid UTF-8.
    #[error("invalid utf-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl From<bytes::TryGetError> for ProtocolError {
    fn from(e: bytes::TryGetError) -> Self {
        Self::Truncated {
            needed: e.requested,
            remaining: e.available,
        }
    }
}

use crate::HostId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No connection to this host exists.
    #[error("unknown host {0}")]
    UnknownHost(HostId),

    /// The connection to this host was closed.
    #[error("connection to {0} closed")]
    Closed(HostId),
}

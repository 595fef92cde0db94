//! In-process transport backed by Tokio unbounded channels.
//!
//! Each endpoint owns an inbox. Linking two endpoints hands each one a
//! clone of the other's inbox sender, so a `send_to` is a channel push
//! tagged with the sender's host id.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::{HostId, Packet, Transport, TransportError, TransportEvent};

type Inbox = mpsc::UnboundedSender<TransportEvent>;

/// A [`Transport`] endpoint living in the same process as its peers.
pub struct ChannelTransport {
    local: HostId,
    inbox: Inbox,
    peers: Mutex<BTreeMap<HostId, Inbox>>,
}

impl ChannelTransport {
    /// Creates an endpoint and the receiving half of its inbox.
    pub fn new(
        local: HostId,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            local,
            inbox: tx,
            peers: Mutex::new(BTreeMap::new()),
        });
        (transport, rx)
    }

    /// Connects two endpoints in both directions.
    ///
    /// Each side receives a [`TransportEvent::Connected`] for the other.
    pub fn link(a: &ChannelTransport, b: &ChannelTransport) {
        a.peers().insert(b.local, b.inbox.clone());
        b.peers().insert(a.local, a.inbox.clone());
        let _ = a.inbox.send(TransportEvent::Connected(b.local));
        let _ = b.inbox.send(TransportEvent::Connected(a.local));
        tracing::debug!(a = %a.local, b = %b.local, "channel endpoints linked");
    }

    /// Host ids of every currently linked peer, in ascending order.
    pub fn peer_ids(&self) -> Vec<HostId> {
        self.peers().keys().copied().collect()
    }

    fn peers(&self) -> MutexGuard<'_, BTreeMap<HostId, Inbox>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, host: HostId, inbox: &Inbox, data: &[u8]) -> Result<(), TransportError> {
        inbox
            .send(TransportEvent::Data(Packet {
                from: self.local,
                data: data.to_vec(),
            }))
            .map_err(|_| TransportError::Closed(host))
    }
}

impl Transport for ChannelTransport {
    fn local_id(&self) -> HostId {
        self.local
    }

    fn send_to(&self, host: HostId, data: &[u8]) -> Result<(), TransportError> {
        let peers = self.peers();
        let inbox = peers.get(&host).ok_or(TransportError::UnknownHost(host))?;
        self.push(host, inbox, data)
    }

    fn broadcast(&self, data: &[u8]) -> Result<(), TransportError> {
        let peers = self.peers();
        for (host, inbox) in peers.iter() {
            if let Err(e) = self.push(*host, inbox, data) {
                tracing::debug!(from = %self.local, error = %e, "broadcast skipped peer");
            }
        }
        Ok(())
    }

    fn disconnect(&self, host: HostId) -> Result<(), TransportError> {
        let inbox = self
            .peers()
            .remove(&host)
            .ok_or(TransportError::UnknownHost(host))?;
        let _ = inbox.send(TransportEvent::Disconnected(self.local));
        let _ = self.inbox.send(TransportEvent::Disconnected(host));
        tracing::debug!(local = %self.local, %host, "peer disconnected");
        Ok(())
    }
}

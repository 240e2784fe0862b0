// ============================================================================
// Transport Interface
// Outbound delivery of protocol items to neighbouring peers
// ============================================================================

use crate::domain::PeerId;
use crate::protocol::TxItem;
use crossbeam::queue::SegQueue;
use parking_lot::RwLock;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("peer {0} is unreachable")]
    Unreachable(PeerId),
}

/// Sends typed protocol items to a peer.
///
/// Must not block on the network; queue and return.
pub trait Transport: Send + Sync {
    fn send(&self, peer: &PeerId, item: TxItem) -> Result<(), TransportError>;
}

/// In-memory outbox. Items wait in a lock-free queue until drained.
///
/// Peers marked unreachable make `send` fail, which the transaction
/// manager treats as a disconnect.
#[derive(Debug, Default)]
pub struct QueuedTransport {
    outbox: SegQueue<(PeerId, TxItem)>,
    unreachable: RwLock<HashSet<PeerId>>,
}

impl QueuedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, peer: PeerId) {
        self.unreachable.write().insert(peer);
    }

    pub fn set_reachable(&self, peer: &PeerId) {
        self.unreachable.write().remove(peer);
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<(PeerId, TxItem)> {
        let mut items = Vec::with_capacity(self.outbox.len());
        while let Some(entry) = self.outbox.pop() {
            items.push(entry);
        }
        items
    }

    pub fn len(&self) -> usize {
        self.outbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.is_empty()
    }
}

impl Transport for QueuedTransport {
    fn send(&self, peer: &PeerId, item: TxItem) -> Result<(), TransportError> {
        if self.unreachable.read().contains(peer) {
            return Err(TransportError::Unreachable(peer.clone()));
        }
        self.outbox.push((peer.clone(), item));
        Ok(())
    }
}

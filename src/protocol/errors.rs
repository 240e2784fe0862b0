// ============================================================================
// Protocol Errors and Abort Reasons
// ============================================================================

use super::phase::TxPhase;
use crate::domain::{Currency, PeerId, TxId};
use crate::numeric::Amount;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Protocol faults. Every one of them resolves the affected transaction to
/// ABORT; none is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProtocolError {
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxId),

    #[error("transaction {0} is already registered")]
    DuplicateInitiation(TxId),

    #[error("transaction {tx_id}: {received} is not allowed in phase {phase}")]
    PhaseViolation {
        tx_id: TxId,
        phase: TxPhase,
        received: TxPhase,
    },

    #[error("transaction {tx_id}: cannot honour {amount} {currency}")]
    ReservationConflict {
        tx_id: TxId,
        amount: Amount,
        currency: Currency,
    },

    #[error("transaction {tx_id}: {peer} is not on the payment path")]
    NotOnPath { tx_id: TxId, peer: PeerId },

    #[error("transaction {tx_id}: unexpected item from {sender}")]
    UnexpectedSender { tx_id: TxId, sender: PeerId },

    #[error("invalid payment: {0}")]
    InvalidPayment(String),
}

/// A neighbour failing to play its part.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeerFailure {
    /// No reply within the reply timeout
    Timeout(PeerId),
    /// Transport lost the peer
    Disconnected(PeerId),
    /// Peer sent something the protocol forbids
    Misbehaved(PeerId),
}

impl PeerFailure {
    pub fn peer(&self) -> &PeerId {
        match self {
            PeerFailure::Timeout(peer)
            | PeerFailure::Disconnected(peer)
            | PeerFailure::Misbehaved(peer) => peer,
        }
    }
}

impl fmt::Display for PeerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerFailure::Timeout(peer) => write!(f, "{} timed out", peer),
            PeerFailure::Disconnected(peer) => write!(f, "{} disconnected", peer),
            PeerFailure::Misbehaved(peer) => write!(f, "{} misbehaved", peer),
        }
    }
}

/// Why a transaction ended in ABORT at this node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AbortReason {
    /// A participant voted no
    VotedNo(PeerId),
    /// Local cancellation
    Cancelled,
    /// A neighbour sent ABORT
    Relayed(PeerId),
    Peer(PeerFailure),
    Protocol(ProtocolError),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::VotedNo(peer) => write!(f, "{} voted no", peer),
            AbortReason::Cancelled => f.write_str("cancelled"),
            AbortReason::Relayed(peer) => write!(f, "abort relayed by {}", peer),
            AbortReason::Peer(failure) => write!(f, "{}", failure),
            AbortReason::Protocol(err) => write!(f, "{}", err),
        }
    }
}

/// Final result reported to whoever initiated a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    Aborted(AbortReason),
}

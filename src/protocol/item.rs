// ============================================================================
// Protocol Items
// Typed messages exchanged between neighbours on a payment path
// ============================================================================

use super::phase::TxPhase;
use crate::domain::{Payment, PeerId, TxId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TxMessage {
    /// Opens the transaction at the receiver; carries the QUERY phase
    InitTx(Payment),
    /// A participant's vote, relayed hop by hop toward the coordinator
    Vote { voter: PeerId, approve: bool },
    Commit,
    AckCommit,
    Abort,
}

impl TxMessage {
    /// Phase the message declares.
    pub fn phase(&self) -> TxPhase {
        match self {
            TxMessage::InitTx(_) => TxPhase::Query,
            TxMessage::Vote { approve: true, .. } => TxPhase::VoteYes,
            TxMessage::Vote { approve: false, .. } => TxPhase::VoteNo,
            TxMessage::Commit => TxPhase::Commit,
            TxMessage::AckCommit => TxPhase::AckCommit,
            TxMessage::Abort => TxPhase::Abort,
        }
    }
}

/// One protocol item as handed to or received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TxItem {
    pub tx_id: TxId,
    /// Neighbour that sent this item (not necessarily its author)
    pub sender: PeerId,
    pub message: TxMessage,
}

impl TxItem {
    pub fn new(tx_id: TxId, sender: PeerId, message: TxMessage) -> Self {
        Self {
            tx_id,
            sender,
            message,
        }
    }

    pub fn phase(&self) -> TxPhase {
        self.message.phase()
    }

    /// Payment descriptor, present only on the opening item.
    pub fn payment(&self) -> Option<&Payment> {
        match &self.message {
            TxMessage::InitTx(payment) => Some(payment),
            _ => None,
        }
    }
}

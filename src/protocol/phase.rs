// ============================================================================
// Commit Phases and Roles
// ============================================================================

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Step of the commit state machine for one transaction at one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TxPhase {
    Query = 0,
    VoteYes = 1,
    VoteNo = 2,
    Commit = 3,
    AckCommit = 4,
    Abort = 5,
}

impl TxPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxPhase::AckCommit | TxPhase::Abort)
    }

    /// Legal successor check.
    ///
    /// QUERY and ABORT are reachable from every non-terminal phase; nothing
    /// leaves a terminal phase.
    pub fn can_transition_to(&self, next: TxPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, TxPhase::Query) | (_, TxPhase::Abort) => true,

            (TxPhase::Query, TxPhase::VoteYes)
            | (TxPhase::Query, TxPhase::VoteNo)
            | (TxPhase::Query, TxPhase::Commit) => true,

            (TxPhase::VoteYes, TxPhase::Commit) | (TxPhase::VoteYes, TxPhase::AckCommit) => true,

            (TxPhase::Commit, TxPhase::AckCommit) => true,

            _ => false,
        }
    }

    pub fn transition(&self, next: TxPhase) -> Result<TxPhase, String> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(format!("Invalid transition from {} to {}", self, next))
        }
    }
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxPhase::Query => "QUERY",
            TxPhase::VoteYes => "VOTE_YES",
            TxPhase::VoteNo => "VOTE_NO",
            TxPhase::Commit => "COMMIT",
            TxPhase::AckCommit => "ACK_COMMIT",
            TxPhase::Abort => "ABORT",
        };
        f.write_str(name)
    }
}

/// Part a node plays in one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Role {
    /// Payer's node; owns the commit/abort decision
    Coordinator,
    /// Terminal recipient
    Payee,
    /// Intermediate node forwarding value it does not keep
    Hop,
}

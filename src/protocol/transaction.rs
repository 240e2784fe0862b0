// ============================================================================
// Transaction State
// One node's view of a multi-hop payment in flight
// ============================================================================

use super::errors::{ProtocolError, TxOutcome};
use super::phase::{Role, TxPhase};
use crate::domain::{Payment, PeerId, TxId};
use chrono::{DateTime, Utc};
use crossbeam::channel::Sender;

/// Role-specific bookkeeping.
#[derive(Debug)]
pub(crate) enum RoleState {
    Coordinator {
        /// Participants (hops then payee) whose vote has not arrived yet
        awaiting: Vec<PeerId>,
        outcome: Sender<TxOutcome>,
    },
    Hop {
        /// INIT_TX went out to the next node
        forwarded: bool,
    },
    Payee,
}

#[derive(Debug)]
pub struct Transaction {
    id: TxId,
    payment: Payment,
    role_state: RoleState,
    phase: TxPhase,
    previous: Option<PeerId>,
    next: Option<PeerId>,
    deadline: DateTime<Utc>,
    pub(crate) reserved: bool,
}

impl Transaction {
    /// Coordinator side, created by the payer's node.
    pub(crate) fn coordinator(
        id: TxId,
        payment: Payment,
        outcome: Sender<TxOutcome>,
        deadline: DateTime<Utc>,
    ) -> Self {
        let next = Some(payment.first_hop().clone());
        let awaiting = payment.participants().cloned().collect();
        Self {
            id,
            payment,
            role_state: RoleState::Coordinator { awaiting, outcome },
            phase: TxPhase::Query,
            previous: None,
            next,
            deadline,
            reserved: false,
        }
    }

    /// Hop or payee side, created on receipt of INIT_TX.
    pub(crate) fn cohort(
        role: Role,
        id: TxId,
        payment: Payment,
        previous: PeerId,
        next: Option<PeerId>,
        deadline: DateTime<Utc>,
    ) -> Self {
        let role_state = match role {
            Role::Payee => RoleState::Payee,
            _ => RoleState::Hop { forwarded: false },
        };
        Self {
            id,
            payment,
            role_state,
            phase: TxPhase::Query,
            previous: Some(previous),
            next,
            deadline,
            reserved: false,
        }
    }

    pub fn id(&self) -> &TxId {
        &self.id
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    pub fn role(&self) -> Role {
        match self.role_state {
            RoleState::Coordinator { .. } => Role::Coordinator,
            RoleState::Hop { .. } => Role::Hop,
            RoleState::Payee => Role::Payee,
        }
    }

    pub fn phase(&self) -> TxPhase {
        self.phase
    }

    pub fn previous(&self) -> Option<&PeerId> {
        self.previous.as_ref()
    }

    pub fn next(&self) -> Option<&PeerId> {
        self.next.as_ref()
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub fn is_neighbour(&self, peer: &PeerId) -> bool {
        self.previous.as_ref() == Some(peer) || self.next.as_ref() == Some(peer)
    }

    pub(crate) fn set_deadline(&mut self, deadline: DateTime<Utc>) {
        self.deadline = deadline;
    }

    /// Move to `to`, returning the phase left behind.
    pub(crate) fn advance(&mut self, to: TxPhase) -> Result<TxPhase, ProtocolError> {
        let from = self.phase;
        self.phase = from
            .transition(to)
            .map_err(|_| ProtocolError::PhaseViolation {
                tx_id: self.id.clone(),
                phase: from,
                received: to,
            })?;
        Ok(from)
    }

    pub(crate) fn mark_forwarded(&mut self) {
        if let RoleState::Hop { forwarded } = &mut self.role_state {
            *forwarded = true;
        }
    }

    /// Count a vote at the coordinator.
    ///
    /// Returns false for a voter that is not a participant. Repeated votes
    /// are accepted and change nothing.
    pub(crate) fn record_vote(&mut self, voter: &PeerId) -> bool {
        if !self.payment.participants().any(|p| p == voter) {
            return false;
        }
        if let RoleState::Coordinator { awaiting, .. } = &mut self.role_state {
            awaiting.retain(|p| p != voter);
        }
        true
    }

    pub(crate) fn all_voted(&self) -> bool {
        match &self.role_state {
            RoleState::Coordinator { awaiting, .. } => awaiting.is_empty(),
            _ => false,
        }
    }

    /// Neighbours that know about this transaction and must hear of an abort.
    pub(crate) fn engaged_neighbours(&self) -> Vec<PeerId> {
        let mut peers = Vec::with_capacity(2);
        if let Some(previous) = &self.previous {
            peers.push(previous.clone());
        }
        let next_engaged = match &self.role_state {
            RoleState::Coordinator { .. } => true,
            RoleState::Hop { forwarded } => *forwarded,
            RoleState::Payee => false,
        };
        if next_engaged {
            if let Some(next) = &self.next {
                peers.push(next.clone());
            }
        }
        peers
    }

    /// Peer whose silence is holding the transaction up, for timeout blame.
    pub(crate) fn awaited_peer(&self) -> Option<PeerId> {
        match (&self.role_state, self.phase) {
            (RoleState::Coordinator { awaiting, .. }, TxPhase::Query) => awaiting.first().cloned(),
            (_, TxPhase::Commit) => self.next.clone(),
            (_, TxPhase::Query) | (_, TxPhase::VoteYes) => self.previous.clone(),
            _ => None,
        }
    }

    /// Hand the final result to the initiator, if this is the coordinator.
    pub(crate) fn report(&self, outcome: TxOutcome) {
        if let RoleState::Coordinator { outcome: sender, .. } = &self.role_state {
            // Initiator may have dropped its handle
            let _ = sender.try_send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Route};
    use crossbeam::channel::bounded;
    use rust_decimal::Decimal;
    use smallvec::smallvec;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id).unwrap()
    }

    fn payment() -> Payment {
        let path: Route = smallvec![peer("h1"), peer("h2")];
        Payment::new(
            Decimal::TEN,
            Currency::new("EUR").unwrap(),
            peer("payer"),
            peer("payee"),
            path,
        )
    }

    #[test]
    fn test_coordinator_collects_votes() {
        let (sender, _outcome) = bounded(1);
        let mut tx = Transaction::coordinator(
            TxId::new(peer("payer"), 1),
            payment(),
            sender,
            Utc::now(),
        );
        assert_eq!(tx.role(), Role::Coordinator);
        assert_eq!(tx.next(), Some(&peer("h1")));
        assert_eq!(tx.awaited_peer(), Some(peer("h1")));

        assert!(tx.record_vote(&peer("h1")));
        assert!(tx.record_vote(&peer("h1")));
        assert!(!tx.record_vote(&peer("stranger")));
        assert_eq!(tx.awaited_peer(), Some(peer("h2")));
        assert!(!tx.all_voted());

        assert!(tx.record_vote(&peer("h2")));
        assert!(tx.record_vote(&peer("payee")));
        assert!(tx.all_voted());
    }

    #[test]
    fn test_hop_engages_next_only_after_forwarding() {
        let mut tx = Transaction::cohort(
            Role::Hop,
            TxId::new(peer("payer"), 1),
            payment(),
            peer("payer"),
            Some(peer("h2")),
            Utc::now(),
        );
        assert_eq!(tx.engaged_neighbours(), vec![peer("payer")]);
        tx.mark_forwarded();
        assert_eq!(tx.engaged_neighbours(), vec![peer("payer"), peer("h2")]);
        assert!(tx.is_neighbour(&peer("h2")));
        assert!(!tx.is_neighbour(&peer("payee")));
    }

    #[test]
    fn test_advance_reports_violation() {
        let mut tx = Transaction::cohort(
            Role::Payee,
            TxId::new(peer("payer"), 1),
            payment(),
            peer("h2"),
            None,
            Utc::now(),
        );
        assert_eq!(tx.advance(TxPhase::VoteYes), Ok(TxPhase::Query));
        assert_eq!(tx.awaited_peer(), Some(peer("h2")));

        let err = tx.advance(TxPhase::VoteNo).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::PhaseViolation {
                phase: TxPhase::VoteYes,
                received: TxPhase::VoteNo,
                ..
            }
        ));
        assert_eq!(tx.phase(), TxPhase::VoteYes);
    }
}

// ============================================================================
// Transaction Manager
// Drives coordinators and cohorts through the multi-hop commit protocol
// ============================================================================

use super::errors::{AbortReason, PeerFailure, ProtocolError, TxOutcome};
use super::item::{TxItem, TxMessage};
use super::phase::{Role, TxPhase};
use super::registry::{SharedTransaction, TransactionRegistry};
use super::transaction::Transaction;
use crate::domain::{ExchangeConfig, Payment, PeerId, ProtocolConfig, TxId};
use crate::interfaces::{EventHandler, ExchangeEvent, Identity, Ledger, PaymentSink, Transport};
use crate::numeric::validate_amount;
use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Initiator's view of a transaction it started.
#[derive(Debug)]
pub struct TxHandle {
    tx_id: TxId,
    outcome: Receiver<TxOutcome>,
}

impl TxHandle {
    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    /// Final outcome, if already decided.
    pub fn try_outcome(&self) -> Option<TxOutcome> {
        self.outcome.try_recv().ok()
    }

    /// Block up to `timeout` for the final outcome.
    pub fn wait(&self, timeout: std::time::Duration) -> Option<TxOutcome> {
        self.outcome.recv_timeout(timeout).ok()
    }
}

/// Sends and events produced under a transaction lock, carried out after it
/// is released.
#[derive(Default)]
struct Effects {
    outbound: Vec<(PeerId, TxItem)>,
    events: Vec<ExchangeEvent>,
}

impl Effects {
    fn send(&mut self, to: PeerId, item: TxItem) {
        self.outbound.push((to, item));
    }
}

/// Commit protocol driver for one node.
///
/// Every node runs one manager. It plays coordinator for payments the local
/// peer pays, and hop or payee for transactions opened by an inbound
/// `InitTx`. Each transaction is mutated only under its own lock, so items
/// for different transactions are handled in parallel.
pub struct TransactionManager {
    config: ProtocolConfig,
    identity: Arc<dyn Identity>,
    ledger: Arc<dyn Ledger>,
    transport: Arc<dyn Transport>,
    event_handler: Arc<dyn EventHandler>,
    registry: TransactionRegistry,
    sequence: AtomicU64,
}

impl TransactionManager {
    pub fn new(
        config: ProtocolConfig,
        identity: Arc<dyn Identity>,
        ledger: Arc<dyn Ledger>,
        transport: Arc<dyn Transport>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            config,
            identity,
            ledger,
            transport,
            event_handler,
            registry: TransactionRegistry::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Create a manager from a complete configuration, rejecting invalid settings
    pub fn from_config(
        config: &ExchangeConfig,
        identity: Arc<dyn Identity>,
        ledger: Arc<dyn Ledger>,
        transport: Arc<dyn Transport>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Result<Self, String> {
        config.validate()?;
        Ok(Self::new(
            config.protocol.clone(),
            identity,
            ledger,
            transport,
            event_handler,
        ))
    }

    pub fn own_id(&self) -> &PeerId {
        self.identity.own_id()
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Number of transactions still in flight on this node
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    pub fn phase_of(&self, tx_id: &TxId) -> Option<TxPhase> {
        self.registry.get(tx_id).map(|tx| tx.lock().phase())
    }

    // ========================================================================
    // Coordinator
    // ========================================================================

    /// Start settling a payment this node pays
    pub fn init_coordinator(&self, payment: Payment) -> Result<TxHandle, ProtocolError> {
        self.init_coordinator_at(payment, Utc::now())
    }

    pub fn init_coordinator_at(
        &self,
        payment: Payment,
        now: DateTime<Utc>,
    ) -> Result<TxHandle, ProtocolError> {
        let me = self.identity.own_id().clone();
        if payment.payer != me {
            return Err(ProtocolError::InvalidPayment(format!(
                "payer {} is not this node",
                payment.payer
            )));
        }
        if payment.is_internal() {
            return Err(ProtocolError::InvalidPayment(
                "payer and payee are the same peer".to_string(),
            ));
        }
        if !payment.has_valid_path() {
            return Err(ProtocolError::InvalidPayment(
                "path visits a peer twice".to_string(),
            ));
        }
        validate_amount(payment.amount)
            .map_err(|err| ProtocolError::InvalidPayment(err.to_string()))?;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let tx_id = TxId::new(me.clone(), sequence);
        let first_hop = payment.first_hop().clone();

        if !self
            .ledger
            .reserve(&tx_id, &first_hop, payment.amount, &payment.currency)
        {
            warn!(tx = %tx_id, amount = %payment.amount, currency = %payment.currency, "payer reservation refused");
            return Err(ProtocolError::ReservationConflict {
                tx_id,
                amount: payment.amount,
                currency: payment.currency,
            });
        }

        let (sender, outcome) = bounded(1);
        let mut tx = Transaction::coordinator(
            tx_id.clone(),
            payment.clone(),
            sender,
            self.reply_deadline(now),
        );
        tx.reserved = true;
        if let Err(err) = self
            .registry
            .insert(tx_id.clone(), Arc::new(Mutex::new(tx)))
        {
            self.ledger.release(&tx_id);
            return Err(err);
        }

        info!(
            tx = %tx_id,
            payee = %payment.payee,
            amount = %payment.amount,
            hops = payment.path.len(),
            "transaction initiated"
        );

        let mut effects = Effects::default();
        effects.send(
            first_hop,
            TxItem::new(tx_id.clone(), me, TxMessage::InitTx(payment)),
        );
        self.dispatch(effects, now);

        Ok(TxHandle { tx_id, outcome })
    }

    // ========================================================================
    // Inbound items
    // ========================================================================

    /// Single entry point for items received from neighbours
    pub fn handle_item(&self, item: TxItem) -> Result<(), ProtocolError> {
        self.handle_item_at(item, Utc::now())
    }

    pub fn handle_item_at(&self, item: TxItem, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        let TxItem {
            tx_id,
            sender,
            message,
        } = item;

        match (self.registry.get(&tx_id), message) {
            (None, TxMessage::InitTx(payment)) => self.init_cohort(tx_id, sender, payment, now),
            (None, message) => {
                debug!(tx = %tx_id, %sender, phase = %message.phase(), "item for unknown transaction");
                Err(ProtocolError::UnknownTransaction(tx_id))
            },
            (Some(shared), TxMessage::InitTx(_)) => {
                let err = ProtocolError::DuplicateInitiation(tx_id);
                let mut effects = Effects::default();
                {
                    let mut tx = shared.lock();
                    if !tx.is_neighbour(&sender) {
                        warn!(tx = %tx.id(), %sender, "repeated INIT_TX from a stranger ignored");
                        return Err(ProtocolError::UnexpectedSender {
                            tx_id: tx.id().clone(),
                            sender,
                        });
                    }
                    warn!(tx = %tx.id(), %sender, "repeated INIT_TX");
                    self.abort_locked(
                        &mut tx,
                        None,
                        AbortReason::Protocol(err.clone()),
                        now,
                        &mut effects,
                    );
                }
                self.dispatch(effects, now);
                Err(err)
            },
            (Some(shared), message) => self.process_item(&shared, sender, message, now),
        }
    }

    /// Open a hop or payee transaction for an unseen id.
    fn init_cohort(
        &self,
        tx_id: TxId,
        sender: PeerId,
        payment: Payment,
        now: DateTime<Utc>,
    ) -> Result<(), ProtocolError> {
        let me = self.identity.own_id().clone();

        let role = if payment.payee == me {
            Role::Payee
        } else if payment.is_hop(&me) {
            Role::Hop
        } else {
            warn!(tx = %tx_id, %sender, "INIT_TX for a payment this node is not on");
            self.refuse(&tx_id, sender, now);
            return Err(ProtocolError::NotOnPath { tx_id, peer: me });
        };

        if payment.payer != tx_id.origin || !payment.has_valid_path() {
            warn!(tx = %tx_id, %sender, "INIT_TX with an unusable payment");
            self.refuse(&tx_id, sender, now);
            return Err(ProtocolError::InvalidPayment(
                "payer does not match the transaction origin or the path repeats a peer"
                    .to_string(),
            ));
        }
        if let Err(err) = validate_amount(payment.amount) {
            warn!(tx = %tx_id, %sender, %err, "INIT_TX with an unusable amount");
            self.refuse(&tx_id, sender, now);
            return Err(ProtocolError::InvalidPayment(err.to_string()));
        }

        let previous = match payment.previous_of(&me) {
            Some(previous) => previous.clone(),
            None => return Err(ProtocolError::NotOnPath { tx_id, peer: me }),
        };
        if previous != sender {
            warn!(tx = %tx_id, %sender, expected = %previous, "INIT_TX from the wrong neighbour");
            return Err(ProtocolError::UnexpectedSender { tx_id, sender });
        }
        let next = match role {
            Role::Hop => payment.next_of(&me).cloned(),
            _ => None,
        };

        let shared = Arc::new(Mutex::new(Transaction::cohort(
            role,
            tx_id.clone(),
            payment,
            previous,
            next,
            self.reply_deadline(now),
        )));

        let mut effects = Effects::default();
        let result = {
            let mut tx = shared.lock();
            if let Err(err) = self.registry.insert(tx_id.clone(), Arc::clone(&shared)) {
                // Lost a race against a concurrent INIT_TX for the same id
                drop(tx);
                self.abort_registered(&tx_id, AbortReason::Protocol(err.clone()), now);
                return Err(err);
            }
            debug!(tx = %tx_id, ?role, "transaction registered");

            let result = self.cast_vote(&mut tx, now, &mut effects);
            if let Err(err) = &result {
                // A NO vote already told upstream; nothing downstream knows yet
                let origin = tx.previous().cloned();
                self.abort_locked(
                    &mut tx,
                    origin,
                    AbortReason::Protocol(err.clone()),
                    now,
                    &mut effects,
                );
            }
            result
        };
        self.dispatch(effects, now);
        result
    }

    /// Reserve and vote; on YES a hop also opens the transaction downstream.
    fn cast_vote(
        &self,
        tx: &mut Transaction,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) -> Result<(), ProtocolError> {
        let me = self.identity.own_id().clone();
        let tx_id = tx.id().clone();
        let previous = match tx.previous() {
            Some(previous) => previous.clone(),
            None => {
                return Err(ProtocolError::NotOnPath { tx_id, peer: me });
            },
        };
        let counterparty = tx.next().unwrap_or(&previous).clone();
        let amount = tx.payment().amount;
        let currency = tx.payment().currency.clone();

        if !self.ledger.reserve(&tx_id, &counterparty, amount, &currency) {
            self.transition(tx, TxPhase::VoteNo, now, effects)?;
            effects.send(
                previous,
                TxItem::new(
                    tx_id.clone(),
                    me.clone(),
                    TxMessage::Vote {
                        voter: me,
                        approve: false,
                    },
                ),
            );
            return Err(ProtocolError::ReservationConflict {
                tx_id,
                amount,
                currency,
            });
        }

        tx.reserved = true;
        self.transition(tx, TxPhase::VoteYes, now, effects)?;
        effects.send(
            previous,
            TxItem::new(
                tx_id.clone(),
                me.clone(),
                TxMessage::Vote {
                    voter: me.clone(),
                    approve: true,
                },
            ),
        );
        if let Some(next) = tx.next().cloned() {
            effects.send(
                next,
                TxItem::new(tx_id, me, TxMessage::InitTx(tx.payment().clone())),
            );
            tx.mark_forwarded();
        }
        Ok(())
    }

    /// Route an item to its registered transaction.
    fn process_item(
        &self,
        shared: &SharedTransaction,
        sender: PeerId,
        message: TxMessage,
        now: DateTime<Utc>,
    ) -> Result<(), ProtocolError> {
        let mut effects = Effects::default();
        let result = {
            let mut tx = shared.lock();
            if tx.phase().is_terminal() {
                // Finished while this item was in flight
                return Err(ProtocolError::UnknownTransaction(tx.id().clone()));
            }
            if !tx.is_neighbour(&sender) {
                warn!(tx = %tx.id(), %sender, "item from a peer that is not a neighbour");
                return Err(ProtocolError::UnexpectedSender {
                    tx_id: tx.id().clone(),
                    sender,
                });
            }

            let result = self.apply(&mut tx, sender.clone(), message, now, &mut effects);
            if let Err(err) = &result {
                warn!(tx = %tx.id(), %sender, %err, "protocol error");
                if matches!(err, ProtocolError::PhaseViolation { .. }) {
                    effects.events.push(ExchangeEvent::PeerFailed {
                        tx_id: tx.id().clone(),
                        peer: sender.clone(),
                        failure: PeerFailure::Misbehaved(sender),
                        timestamp: now,
                    });
                }
                self.abort_locked(
                    &mut tx,
                    None,
                    AbortReason::Protocol(err.clone()),
                    now,
                    &mut effects,
                );
            }
            result
        };
        self.dispatch(effects, now);
        result
    }

    /// Protocol step for one item from a neighbour.
    fn apply(
        &self,
        tx: &mut Transaction,
        sender: PeerId,
        message: TxMessage,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) -> Result<(), ProtocolError> {
        let me = self.identity.own_id().clone();
        let tx_id = tx.id().clone();
        let from_previous = tx.previous() == Some(&sender);
        let from_next = tx.next() == Some(&sender);
        let deadline = self.reply_deadline(now);

        match (tx.role(), tx.phase(), message) {
            (_, _, TxMessage::Abort) => {
                self.abort_locked(
                    tx,
                    Some(sender.clone()),
                    AbortReason::Relayed(sender),
                    now,
                    effects,
                );
                Ok(())
            },

            (Role::Coordinator, TxPhase::Query, TxMessage::Vote { voter, approve }) if from_next => {
                if !approve {
                    self.abort_locked(tx, None, AbortReason::VotedNo(voter), now, effects);
                    return Ok(());
                }
                if !tx.record_vote(&voter) {
                    return Err(ProtocolError::NotOnPath { tx_id, peer: voter });
                }
                tx.set_deadline(deadline);
                if tx.all_voted() {
                    self.make_durable(tx)?;
                    self.transition(tx, TxPhase::Commit, now, effects)?;
                    effects.send(sender, TxItem::new(tx_id, me, TxMessage::Commit));
                }
                Ok(())
            },

            (Role::Hop, TxPhase::VoteYes, TxMessage::Vote { voter, approve }) if from_next => {
                if let Some(previous) = tx.previous().cloned() {
                    effects.send(
                        previous,
                        TxItem::new(tx_id, me, TxMessage::Vote { voter, approve }),
                    );
                }
                tx.set_deadline(deadline);
                Ok(())
            },

            (Role::Hop, TxPhase::VoteYes, TxMessage::Commit) if from_previous => {
                self.make_durable(tx)?;
                self.transition(tx, TxPhase::Commit, now, effects)?;
                if let Some(next) = tx.next().cloned() {
                    effects.send(next, TxItem::new(tx_id, me, TxMessage::Commit));
                }
                tx.set_deadline(deadline);
                Ok(())
            },

            (Role::Payee, TxPhase::VoteYes, TxMessage::Commit) if from_previous => {
                self.make_durable(tx)?;
                self.transition(tx, TxPhase::Commit, now, effects)?;
                self.complete_locked(tx, now, effects)?;
                effects.send(sender, TxItem::new(tx_id, me, TxMessage::AckCommit));
                Ok(())
            },

            (Role::Hop, TxPhase::Commit, TxMessage::AckCommit) if from_next => {
                self.complete_locked(tx, now, effects)?;
                if let Some(previous) = tx.previous().cloned() {
                    effects.send(previous, TxItem::new(tx_id, me, TxMessage::AckCommit));
                }
                Ok(())
            },

            (Role::Coordinator, TxPhase::Commit, TxMessage::AckCommit) if from_next => {
                self.complete_locked(tx, now, effects)
            },

            (_, phase, message) => Err(ProtocolError::PhaseViolation {
                tx_id,
                phase,
                received: message.phase(),
            }),
        }
    }

    // ========================================================================
    // Failure handling
    // ========================================================================

    /// Cancel a transaction that has not reached its commit decision
    pub fn cancel(&self, tx_id: &TxId) -> Result<(), ProtocolError> {
        let now = Utc::now();
        let shared = self
            .registry
            .get(tx_id)
            .ok_or_else(|| ProtocolError::UnknownTransaction(tx_id.clone()))?;

        let mut effects = Effects::default();
        {
            let mut tx = shared.lock();
            match tx.phase() {
                TxPhase::AckCommit | TxPhase::Abort => {
                    return Err(ProtocolError::UnknownTransaction(tx_id.clone()));
                },
                TxPhase::Commit => {
                    return Err(ProtocolError::PhaseViolation {
                        tx_id: tx_id.clone(),
                        phase: TxPhase::Commit,
                        received: TxPhase::Abort,
                    });
                },
                _ => {},
            }
            self.abort_locked(&mut tx, None, AbortReason::Cancelled, now, &mut effects);
        }
        self.dispatch(effects, now);
        Ok(())
    }

    /// Give up on every transaction whose awaited reply is overdue at `now`.
    ///
    /// Transactions before the commit decision abort; those past it keep
    /// their durable transfer and close with a `PeerFailed` event. Returns
    /// how many were closed.
    pub fn check_timeouts(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for shared in self.registry.snapshot() {
            let mut effects = Effects::default();
            {
                let mut tx = shared.lock();
                if tx.phase().is_terminal() || tx.deadline() > now {
                    continue;
                }
                let silent = tx
                    .awaited_peer()
                    .or_else(|| tx.next().cloned())
                    .unwrap_or_else(|| tx.id().origin.clone());
                warn!(tx = %tx.id(), peer = %silent, phase = %tx.phase(), "reply timed out");
                self.abort_locked(
                    &mut tx,
                    None,
                    AbortReason::Peer(PeerFailure::Timeout(silent)),
                    now,
                    &mut effects,
                );
                expired += 1;
            }
            self.dispatch(effects, now);
        }
        expired
    }

    /// Give up on every transaction that has `peer` as a neighbour, with the
    /// same split as `check_timeouts`. Returns how many were closed.
    pub fn peer_disconnected(&self, peer: &PeerId) -> usize {
        let now = Utc::now();
        let mut aborted = 0;
        for shared in self.registry.snapshot() {
            let mut effects = Effects::default();
            {
                let mut tx = shared.lock();
                if tx.phase().is_terminal() || !tx.is_neighbour(peer) {
                    continue;
                }
                self.abort_locked(
                    &mut tx,
                    Some(peer.clone()),
                    AbortReason::Peer(PeerFailure::Disconnected(peer.clone())),
                    now,
                    &mut effects,
                );
                aborted += 1;
            }
            self.dispatch(effects, now);
        }
        if aborted > 0 {
            warn!(%peer, aborted, "neighbour disconnected");
        }
        aborted
    }

    // ========================================================================
    // Private methods
    // ========================================================================

    fn reply_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.config.reply_timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn transition(
        &self,
        tx: &mut Transaction,
        to: TxPhase,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) -> Result<(), ProtocolError> {
        let from = tx.advance(to)?;
        debug!(tx = %tx.id(), %from, %to, "phase changed");
        effects.events.push(ExchangeEvent::TxPhaseChanged {
            tx_id: tx.id().clone(),
            role: tx.role(),
            from,
            to,
            timestamp: now,
        });
        Ok(())
    }

    /// Turn the reservation into a permanent transfer. Must happen before
    /// the transaction enters COMMIT.
    fn make_durable(&self, tx: &mut Transaction) -> Result<(), ProtocolError> {
        let tx_id = tx.id().clone();
        if !tx.reserved || !self.ledger.commit(&tx_id) {
            return Err(ProtocolError::ReservationConflict {
                tx_id,
                amount: tx.payment().amount,
                currency: tx.payment().currency.clone(),
            });
        }
        tx.reserved = false;
        debug!(tx = %tx_id, role = ?tx.role(), "transfer made durable");
        Ok(())
    }

    /// Retire a transaction whose transfer is durable.
    fn complete_locked(
        &self,
        tx: &mut Transaction,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) -> Result<(), ProtocolError> {
        let tx_id = tx.id().clone();
        self.transition(tx, TxPhase::AckCommit, now, effects)?;
        self.registry.remove(&tx_id);

        info!(tx = %tx_id, role = ?tx.role(), amount = %tx.payment().amount, "transaction committed");
        effects.events.push(ExchangeEvent::TxCommitted {
            tx_id,
            role: tx.role(),
            timestamp: now,
        });
        tx.report(TxOutcome::Committed);
        Ok(())
    }

    /// Release, unregister and tell every engaged neighbour except `origin`.
    ///
    /// Past the commit decision the local transfer is already durable, so
    /// the transaction closes as committed instead.
    fn abort_locked(
        &self,
        tx: &mut Transaction,
        origin: Option<PeerId>,
        reason: AbortReason,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) {
        if tx.phase().is_terminal() {
            return;
        }
        if tx.phase() == TxPhase::Commit {
            self.close_unconfirmed(tx, reason, now, effects);
            return;
        }
        let tx_id = tx.id().clone();
        let role = tx.role();
        let from = tx.phase();

        if tx.reserved {
            self.ledger.release(&tx_id);
            tx.reserved = false;
        }
        if let Err(err) = tx.advance(TxPhase::Abort) {
            warn!(tx = %tx_id, %err, "abort refused");
            return;
        }
        self.registry.remove(&tx_id);

        let me = self.identity.own_id().clone();
        for peer in tx.engaged_neighbours() {
            if origin.as_ref() != Some(&peer) {
                effects.send(peer, TxItem::new(tx_id.clone(), me.clone(), TxMessage::Abort));
            }
        }

        warn!(tx = %tx_id, ?role, %reason, "transaction aborted");
        effects.events.push(ExchangeEvent::TxPhaseChanged {
            tx_id: tx_id.clone(),
            role,
            from,
            to: TxPhase::Abort,
            timestamp: now,
        });
        if let AbortReason::Peer(failure) = &reason {
            effects.events.push(ExchangeEvent::PeerFailed {
                tx_id: tx_id.clone(),
                peer: failure.peer().clone(),
                failure: failure.clone(),
                timestamp: now,
            });
        }
        tx.report(TxOutcome::Aborted(reason.clone()));
        effects.events.push(ExchangeEvent::TxAborted {
            tx_id,
            role,
            reason,
            timestamp: now,
        });
    }

    /// Close a durable transaction whose downstream confirmation will not
    /// arrive, recording the neighbour held responsible.
    fn close_unconfirmed(
        &self,
        tx: &mut Transaction,
        reason: AbortReason,
        now: DateTime<Utc>,
        effects: &mut Effects,
    ) {
        warn!(tx = %tx.id(), role = ?tx.role(), %reason, "commit unconfirmed; transfer stays durable");
        let failure = match &reason {
            AbortReason::Peer(failure) => Some(failure.clone()),
            AbortReason::Relayed(peer) => Some(PeerFailure::Misbehaved(peer.clone())),
            _ => None,
        };
        if let Some(failure) = failure {
            effects.events.push(ExchangeEvent::PeerFailed {
                tx_id: tx.id().clone(),
                peer: failure.peer().clone(),
                failure,
                timestamp: now,
            });
        }
        if let Err(err) = self.complete_locked(tx, now, effects) {
            warn!(tx = %tx.id(), %err, "close refused");
        }
    }

    fn abort_registered(&self, tx_id: &TxId, reason: AbortReason, now: DateTime<Utc>) {
        let Some(shared) = self.registry.get(tx_id) else {
            return;
        };
        let mut effects = Effects::default();
        self.abort_locked(&mut shared.lock(), None, reason, now, &mut effects);
        self.dispatch(effects, now);
    }

    /// Answer an INIT_TX this node will not take part in.
    fn refuse(&self, tx_id: &TxId, to: PeerId, now: DateTime<Utc>) {
        let me = self.identity.own_id().clone();
        let mut effects = Effects::default();
        effects.send(
            to,
            TxItem::new(
                tx_id.clone(),
                me.clone(),
                TxMessage::Vote {
                    voter: me,
                    approve: false,
                },
            ),
        );
        self.dispatch(effects, now);
    }

    /// Hand queued items to the transport and events to the handler.
    /// An unreachable neighbour counts as disconnected for that transaction.
    fn dispatch(&self, effects: Effects, now: DateTime<Utc>) {
        let Effects { outbound, events } = effects;

        let mut unreachable = Vec::new();
        for (peer, item) in outbound {
            let tx_id = item.tx_id.clone();
            if let Err(err) = self.transport.send(&peer, item) {
                warn!(tx = %tx_id, %peer, %err, "send failed");
                unreachable.push((tx_id, peer));
            }
        }

        if !events.is_empty() {
            self.event_handler.on_events(events);
        }

        for (tx_id, peer) in unreachable {
            let Some(shared) = self.registry.get(&tx_id) else {
                continue;
            };
            let mut effects = Effects::default();
            self.abort_locked(
                &mut shared.lock(),
                Some(peer.clone()),
                AbortReason::Peer(PeerFailure::Disconnected(peer)),
                now,
                &mut effects,
            );
            self.dispatch(effects, now);
        }
    }
}

impl PaymentSink for TransactionManager {
    fn on_payment(&self, payment: Payment) {
        if payment.is_internal() {
            debug!(payment = %payment.id, amount = %payment.amount, "internal payment settled locally");
            return;
        }
        match self.init_coordinator(payment) {
            Ok(handle) => debug!(tx = %handle.tx_id(), "settlement started"),
            Err(err) => warn!(%err, "settlement not started"),
        }
    }
}

// ============================================================================
// Ledger Interface
// Standing/capacity checks and value reservations for the commit protocol
// ============================================================================

use crate::domain::{Currency, PeerId, TxId};
use crate::numeric::Amount;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Reserve-then-commit store of value a node moves for a transaction.
///
/// A reservation is held per transaction id; `commit` makes it durable and
/// `release` drops it. Implementations must make each call atomic.
pub trait Ledger: Send + Sync {
    /// Try to set aside `amount` for `tx`. False when capacity is short or
    /// the transaction already holds a reservation.
    fn reserve(&self, tx: &TxId, counterparty: &PeerId, amount: Amount, currency: &Currency)
        -> bool;

    /// Turn the reservation into a durable transfer. False if none is held.
    fn commit(&self, tx: &TxId) -> bool;

    /// Drop the reservation, if any.
    fn release(&self, tx: &TxId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub counterparty: PeerId,
    pub amount: Amount,
    pub currency: Currency,
}

/// Durable record of a committed reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub tx_id: TxId,
    pub counterparty: PeerId,
    pub amount: Amount,
    pub currency: Currency,
}

#[derive(Debug, Default)]
struct LedgerState {
    capacity: HashMap<Currency, Amount>,
    reservations: HashMap<TxId, Reservation>,
    transfers: Vec<Transfer>,
}

impl LedgerState {
    fn reserved(&self, currency: &Currency) -> Amount {
        self.reservations
            .values()
            .filter(|r| &r.currency == currency)
            .map(|r| r.amount)
            .sum()
    }
}

/// Ledger with a fixed capacity per currency, held in memory.
///
/// Committed transfers reduce capacity permanently.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: Set capacity for a currency
    pub fn with_capacity(self, currency: Currency, amount: Amount) -> Self {
        self.state.lock().capacity.insert(currency, amount);
        self
    }

    /// Capacity not yet reserved or spent.
    pub fn available(&self, currency: &Currency) -> Amount {
        let state = self.state.lock();
        let capacity = state.capacity.get(currency).copied().unwrap_or(Decimal::ZERO);
        capacity - state.reserved(currency)
    }

    pub fn reservation(&self, tx: &TxId) -> Option<Reservation> {
        self.state.lock().reservations.get(tx).cloned()
    }

    pub fn reservation_count(&self) -> usize {
        self.state.lock().reservations.len()
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().transfers.clone()
    }
}

impl Ledger for InMemoryLedger {
    fn reserve(
        &self,
        tx: &TxId,
        counterparty: &PeerId,
        amount: Amount,
        currency: &Currency,
    ) -> bool {
        let mut state = self.state.lock();
        if state.reservations.contains_key(tx) || amount <= Decimal::ZERO {
            return false;
        }

        let capacity = state.capacity.get(currency).copied().unwrap_or(Decimal::ZERO);
        if capacity - state.reserved(currency) < amount {
            return false;
        }

        state.reservations.insert(
            tx.clone(),
            Reservation {
                counterparty: counterparty.clone(),
                amount,
                currency: currency.clone(),
            },
        );
        true
    }

    fn commit(&self, tx: &TxId) -> bool {
        let mut state = self.state.lock();
        let Some(reservation) = state.reservations.remove(tx) else {
            return false;
        };

        if let Some(capacity) = state.capacity.get_mut(&reservation.currency) {
            *capacity -= reservation.amount;
        }
        state.transfers.push(Transfer {
            tx_id: tx.clone(),
            counterparty: reservation.counterparty,
            amount: reservation.amount,
            currency: reservation.currency,
        });
        true
    }

    fn release(&self, tx: &TxId) {
        self.state.lock().reservations.remove(tx);
    }
}

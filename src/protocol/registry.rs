// ============================================================================
// Transaction Registry
// Live transactions keyed by id, each behind its own lock
// ============================================================================

use super::errors::ProtocolError;
use super::transaction::Transaction;
use crate::domain::TxId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

pub type SharedTransaction = Arc<Mutex<Transaction>>;

/// Registry of in-flight transactions.
///
/// The map lock is only held to look up, insert or remove an entry; all
/// protocol work happens under the per-transaction mutex.
#[derive(Default)]
pub struct TransactionRegistry {
    entries: RwLock<HashMap<TxId, SharedTransaction>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transaction. At most one entry exists per id.
    pub fn insert(&self, id: TxId, tx: SharedTransaction) -> Result<(), ProtocolError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return Err(ProtocolError::DuplicateInitiation(id));
        }
        entries.insert(id, tx);
        Ok(())
    }

    pub fn get(&self, id: &TxId) -> Option<SharedTransaction> {
        self.entries.read().get(id).cloned()
    }

    pub fn remove(&self, id: &TxId) -> Option<SharedTransaction> {
        self.entries.write().remove(id)
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn ids(&self) -> Vec<TxId> {
        self.entries.read().keys().cloned().collect()
    }

    /// Every live entry, for sweeps that must not hold the map lock.
    pub fn snapshot(&self) -> Vec<SharedTransaction> {
        self.entries.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Payment, PeerId, Route};
    use crate::protocol::Role;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::thread;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id).unwrap()
    }

    fn shared(id: &TxId) -> SharedTransaction {
        let payment = Payment::new(
            Decimal::ONE,
            Currency::new("EUR").unwrap(),
            peer("payer"),
            peer("payee"),
            Route::new(),
        );
        Arc::new(Mutex::new(Transaction::cohort(
            Role::Payee,
            id.clone(),
            payment,
            peer("payer"),
            None,
            Utc::now(),
        )))
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = TransactionRegistry::new();
        let id = TxId::new(peer("payer"), 1);

        registry.insert(id.clone(), shared(&id)).unwrap();
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ids(), vec![id.clone()]);

        assert!(registry.remove(&id).is_some());
        assert!(registry.is_empty());
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let registry = TransactionRegistry::new();
        let id = TxId::new(peer("payer"), 1);

        registry.insert(id.clone(), shared(&id)).unwrap();
        assert_eq!(
            registry.insert(id.clone(), shared(&id)),
            Err(ProtocolError::DuplicateInitiation(id))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_inserts_admit_one() {
        let registry = Arc::new(TransactionRegistry::new());
        let id = TxId::new(peer("payer"), 7);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = id.clone();
                thread::spawn(move || registry.insert(id.clone(), shared(&id)).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(registry.len(), 1);
    }
}

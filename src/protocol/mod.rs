// ============================================================================
// Protocol Module
// Multi-hop atomic commit: items, phases, transactions and their driver
// ============================================================================

mod errors;
mod item;
mod manager;
mod phase;
mod registry;
mod transaction;

pub use errors::{AbortReason, PeerFailure, ProtocolError, TxOutcome};
pub use item::{TxItem, TxMessage};
pub use manager::{TransactionManager, TxHandle};
pub use phase::{Role, TxPhase};
pub use registry::{SharedTransaction, TransactionRegistry};
pub use transaction::Transaction;

// ============================================================================
// Interfaces Module
// Contains all trait definitions and collaborator contracts
// ============================================================================

mod event_handler;
mod identity;
mod ledger;
mod matching_algorithm;
mod routing;
mod transport;

pub use event_handler::{
    ChannelEventHandler, EventHandler, ExchangeEvent, LoggingEventHandler, NoOpEventHandler,
};
pub use identity::{Identity, StaticIdentity};
pub use ledger::{InMemoryLedger, Ledger, Reservation, Transfer};
pub use matching_algorithm::MatchingAlgorithm;
pub use routing::{DirectRouter, NoOpPaymentSink, PaymentSink, Router};
pub use transport::{QueuedTransport, Transport, TransportError};

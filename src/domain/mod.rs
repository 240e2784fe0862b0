// ============================================================================
// Domain Models Module
// Contains all core domain entities and value objects
// ============================================================================

pub mod config;
pub mod ids;
pub mod order;
pub mod order_book;
pub mod payment;

pub use config::{BookConfig, ExchangeConfig, ProtocolConfig};
pub use ids::{Currency, PaymentId, PeerId, TraderId, TxId};
pub use order::{Order, OrderKey, Side};
pub use order_book::{BookSide, OrderBook};
pub use payment::{Fill, Payment, Route};

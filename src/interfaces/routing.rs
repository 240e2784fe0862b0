// ============================================================================
// Routing and Settlement Interfaces
// Where a matched payment gets its path, and where it goes next
// ============================================================================

use crate::domain::{Currency, Payment, PeerId, Route};
use crate::numeric::Amount;

/// Picks the hops a payment travels through.
pub trait Router: Send + Sync {
    fn route(&self, payer: &PeerId, payee: &PeerId, amount: Amount, currency: &Currency) -> Route;
}

/// Payer and payee are direct neighbours.
pub struct DirectRouter;

impl Router for DirectRouter {
    fn route(&self, _payer: &PeerId, _payee: &PeerId, _amount: Amount, _currency: &Currency) -> Route {
        Route::new()
    }
}

/// Receives payments produced by matches, typically to start settlement.
pub trait PaymentSink: Send + Sync {
    fn on_payment(&self, payment: Payment);
}

/// Discards payments
pub struct NoOpPaymentSink;

impl PaymentSink for NoOpPaymentSink {
    fn on_payment(&self, _payment: Payment) {}
}

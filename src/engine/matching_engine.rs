// ============================================================================
// Matching Engine
// Admission, deduplication, self-matching and the shared sorted book
// ============================================================================

use super::changes::{BookChange, BookChanges, ChangeHub};
use super::price_time::PriceTimePriority;
use crate::domain::{
    BookConfig, Currency, ExchangeConfig, Fill, Order, OrderBook, OrderKey, Payment, Side,
};
use crate::interfaces::{
    DirectRouter, EventHandler, ExchangeEvent, Identity, MatchingAlgorithm, PaymentSink, Router,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of submitting an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Order (or its unmatched remainder) now rests in the shared book.
    /// `payments` holds any partial self-matches made on the way in.
    Accepted { payments: Vec<Payment> },
    /// Key already known; nothing changed
    Duplicate,
    /// Outside the freshness window; nothing stored
    Expired,
    /// Fully self-matched; the order never entered the shared book
    Matched { payments: Vec<Payment> },
}

impl SubmitOutcome {
    pub fn payments(&self) -> &[Payment] {
        match self {
            SubmitOutcome::Accepted { payments } | SubmitOutcome::Matched { payments } => payments,
            SubmitOutcome::Duplicate | SubmitOutcome::Expired => &[],
        }
    }
}

struct BookState {
    /// Every live order, local and foreign
    shared: OrderBook,
    /// Local trader's resting orders only
    own: OrderBook,
    /// Currency whose rows are signalled to subscribers
    active_currency: Option<Currency>,
    /// Keys fully consumed by a local match, kept until they would expire anyway
    consumed: HashSet<OrderKey>,
}

/// Order book engine for one peer.
///
/// Book state sits behind one lock: every mutation is serialised and every
/// view or row index is computed from a single consistent snapshot.
pub struct MatchingEngine {
    config: BookConfig,
    identity: Arc<dyn Identity>,
    algorithm: Box<dyn MatchingAlgorithm>,
    router: Arc<dyn Router>,
    payments: Arc<dyn PaymentSink>,
    event_handler: Arc<dyn EventHandler>,
    state: RwLock<BookState>,
    changes: ChangeHub,
}

impl MatchingEngine {
    /// Create a new matching engine with price-time self-matching and direct routes
    pub fn new(
        config: BookConfig,
        identity: Arc<dyn Identity>,
        payments: Arc<dyn PaymentSink>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Self {
        let active_currency = config.initial_currency.clone();
        Self {
            config,
            identity,
            algorithm: Box::new(PriceTimePriority::new()),
            router: Arc::new(DirectRouter),
            payments,
            event_handler,
            state: RwLock::new(BookState {
                shared: OrderBook::new(),
                own: OrderBook::new(),
                active_currency,
                consumed: HashSet::new(),
            }),
            changes: ChangeHub::default(),
        }
    }

    /// Create an engine from a complete configuration, rejecting invalid settings
    pub fn from_config(
        config: &ExchangeConfig,
        identity: Arc<dyn Identity>,
        payments: Arc<dyn PaymentSink>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Result<Self, String> {
        config.validate()?;
        Ok(Self::new(config.book.clone(), identity, payments, event_handler))
    }

    /// Builder method: Replace the self-matching algorithm
    pub fn with_algorithm(mut self, algorithm: Box<dyn MatchingAlgorithm>) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Builder method: Replace the router used to path payments
    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = router;
        self
    }

    /// Submit an order, judged against the current time
    pub fn submit(&self, order: Order) -> SubmitOutcome {
        self.submit_at(order, Utc::now())
    }

    /// Submit an order, judged against `now`
    pub fn submit_at(&self, order: Order, now: DateTime<Utc>) -> SubmitOutcome {
        let key = order.key();

        if let Err(reason) = self.check_freshness(&order, now) {
            debug!(trader = %key.trader, ts = key.timestamp_ms, %reason, "order rejected");
            self.event_handler.on_event(ExchangeEvent::OrderRejected {
                key,
                reason,
                timestamp: now,
            });
            return SubmitOutcome::Expired;
        }

        let mut events = Vec::new();
        let outcome = {
            let mut state = self.state.write();
            let mut changes = Vec::new();

            let outcome = if state.shared.contains(&key) || state.consumed.contains(&key) {
                debug!(trader = %key.trader, ts = key.timestamp_ms, "duplicate order dropped");
                events.push(ExchangeEvent::OrderDuplicate {
                    key: key.clone(),
                    timestamp: now,
                });
                SubmitOutcome::Duplicate
            } else if self.identity.is_own(order.trader()) {
                self.submit_own(&mut state, order, now, &mut changes, &mut events)
            } else {
                // Foreign orders are never matched against local resting orders.
                // Open protocol gap, kept as-is until the intended semantics are settled.
                // Until then every payment this engine produces has the local
                // trader on both sides, so none reaches a multi-hop coordinator
                // and the router is only consulted for internal payments.
                Self::insert_shared(&mut state, order, &mut changes);
                events.push(ExchangeEvent::OrderAccepted {
                    key: key.clone(),
                    timestamp: now,
                });
                SubmitOutcome::Accepted {
                    payments: Vec::new(),
                }
            };

            // Published under the lock so subscribers see changes in mutation order
            self.changes.publish(&changes);
            outcome
        };

        match &outcome {
            SubmitOutcome::Accepted { .. } => {
                info!(trader = %key.trader, ts = key.timestamp_ms, "order accepted")
            },
            SubmitOutcome::Matched { payments } => {
                info!(trader = %key.trader, fills = payments.len(), "order fully matched")
            },
            _ => {},
        }

        self.event_handler.on_events(events);
        for payment in outcome.payments() {
            self.payments.on_payment(payment.clone());
        }

        outcome
    }

    /// Remove an order by key from the shared and private books
    pub fn remove(&self, key: &OrderKey) -> Option<Order> {
        let removed = {
            let mut state = self.state.write();
            let mut changes = Vec::new();
            let removed = Self::remove_shared(&mut state, key, &mut changes);
            state.own.remove(key);
            self.changes.publish(&changes);
            removed
        };

        if removed.is_some() {
            debug!(trader = %key.trader, ts = key.timestamp_ms, "order removed");
            self.event_handler.on_event(ExchangeEvent::OrderRemoved {
                key: key.clone(),
                timestamp: Utc::now(),
            });
        }
        removed
    }

    /// Drop every order that has aged out of the freshness window
    pub fn expire_stale(&self, now: DateTime<Utc>) -> Vec<Order> {
        let cutoff = now
            .checked_sub_signed(self.config.freshness_window)
            .map_or(i64::MIN, |cutoff| cutoff.timestamp_millis());

        let expired = {
            let mut state = self.state.write();
            let mut changes = Vec::new();
            let mut expired = Vec::new();

            for key in state.shared.stale_keys(cutoff) {
                state.own.remove(&key);
                if let Some(order) = Self::remove_shared(&mut state, &key, &mut changes) {
                    expired.push(order);
                }
            }
            state.consumed.retain(|key| key.timestamp_ms >= cutoff);

            self.changes.publish(&changes);
            expired
        };

        if !expired.is_empty() {
            debug!(count = expired.len(), "expired stale orders");
        }
        self.event_handler.on_events(
            expired
                .iter()
                .map(|order| ExchangeEvent::OrderExpired {
                    key: order.key(),
                    timestamp: now,
                })
                .collect(),
        );
        expired
    }

    /// Price-time sorted orders of one currency: asks best-first, then bids best-first
    pub fn filtered_view(&self, currency: &Currency) -> Vec<Order> {
        self.state.read().shared.view(currency)
    }

    /// Select the currency whose rows are signalled; subscribers get `Reset`
    pub fn set_currency(&self, currency: Currency) {
        let mut state = self.state.write();
        state.active_currency = Some(currency);
        self.changes.publish(&[BookChange::Reset]);
    }

    pub fn active_currency(&self) -> Option<Currency> {
        self.state.read().active_currency.clone()
    }

    /// Row changes of the active currency's view, starting with `Reset`
    pub fn subscribe(&self) -> BookChanges {
        self.changes.subscribe()
    }

    /// Live change subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.changes.subscriber_count()
    }

    pub fn best_ask(&self, currency: &Currency) -> Option<Order> {
        self.state.read().shared.best_ask(currency).cloned()
    }

    pub fn best_bid(&self, currency: &Currency) -> Option<Order> {
        self.state.read().shared.best_bid(currency).cloned()
    }

    pub fn contains(&self, key: &OrderKey) -> bool {
        self.state.read().shared.contains(key)
    }

    /// Number of orders in the shared book
    pub fn len(&self) -> usize {
        self.state.read().shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().shared.is_empty()
    }

    /// The local trader's resting orders
    pub fn own_orders(&self) -> Vec<Order> {
        self.state.read().own.orders().cloned().collect()
    }

    pub fn algorithm_name(&self) -> &str {
        self.algorithm.name()
    }

    // ========================================================================
    // Private methods
    // ========================================================================

    fn check_freshness(&self, order: &Order, now: DateTime<Utc>) -> Result<(), String> {
        let age = now - order.timestamp();
        if age > self.config.freshness_window {
            return Err(format!("order is {}s old", age.num_seconds()));
        }
        if -age > self.config.max_future_skew {
            return Err(format!("order is {}s in the future", (-age).num_seconds()));
        }
        Ok(())
    }

    fn submit_own(
        &self,
        state: &mut BookState,
        mut incoming: Order,
        now: DateTime<Utc>,
        changes: &mut Vec<BookChange>,
        events: &mut Vec<ExchangeEvent>,
    ) -> SubmitOutcome {
        let key = incoming.key();
        let fills = match state
            .own
            .side(incoming.currency(), incoming.side().opposite())
        {
            Some(opposite) => self.algorithm.match_order(&incoming, opposite),
            None => Vec::new(),
        };

        let mut payments = Vec::new();
        for fill in fills {
            let Some(payment) = self.payment_for(&incoming, &fill) else {
                break;
            };

            let Some(resting) = state.own.consume(&fill.resting, fill.quantity) else {
                continue;
            };
            Self::consume_shared(state, &fill.resting, fill.quantity, changes);
            incoming.consume(fill.quantity);

            if resting.is_consumed() {
                state.consumed.insert(fill.resting.clone());
                events.push(ExchangeEvent::OrderRemoved {
                    key: fill.resting.clone(),
                    timestamp: now,
                });
            }
            events.push(ExchangeEvent::OrderMatched {
                key: key.clone(),
                payment: payment.clone(),
                timestamp: now,
            });
            payments.push(payment);
        }

        if incoming.is_consumed() {
            state.consumed.insert(key);
            return SubmitOutcome::Matched { payments };
        }

        state.own.insert(incoming.clone());
        Self::insert_shared(state, incoming, changes);
        events.push(ExchangeEvent::OrderAccepted {
            key,
            timestamp: now,
        });
        SubmitOutcome::Accepted { payments }
    }

    /// The buyer pays the seller the fill's value at the execution price.
    fn payment_for(&self, incoming: &Order, fill: &Fill) -> Option<Payment> {
        let amount = match fill.price.notional(fill.quantity) {
            Ok(amount) => amount,
            Err(err) => {
                warn!(%err, "fill value not representable; matching stopped");
                return None;
            },
        };

        let (payer, payee) = match incoming.side() {
            Side::Bid => (incoming.trader(), &fill.resting.trader),
            Side::Ask => (&fill.resting.trader, incoming.trader()),
        };
        let path = self
            .router
            .route(payer, payee, amount, incoming.currency());

        Some(Payment::new(
            amount,
            incoming.currency().clone(),
            payer.clone(),
            payee.clone(),
            path,
        ))
    }

    fn is_active(state: &BookState, currency: &Currency) -> bool {
        state.active_currency.as_ref() == Some(currency)
    }

    fn insert_shared(state: &mut BookState, order: Order, changes: &mut Vec<BookChange>) {
        let key = order.key();
        let active = Self::is_active(state, order.currency());
        if state.shared.insert(order) && active {
            if let Some(row) = state.shared.position(&key) {
                changes.push(BookChange::Inserted(row));
            }
        }
    }

    fn remove_shared(
        state: &mut BookState,
        key: &OrderKey,
        changes: &mut Vec<BookChange>,
    ) -> Option<Order> {
        let row = state.shared.position(key);
        let order = state.shared.remove(key)?;
        if let (true, Some(row)) = (Self::is_active(state, order.currency()), row) {
            changes.push(BookChange::Removed(row));
        }
        Some(order)
    }

    fn consume_shared(
        state: &mut BookState,
        key: &OrderKey,
        quantity: rust_decimal::Decimal,
        changes: &mut Vec<BookChange>,
    ) {
        let row = state.shared.position(key);
        let Some(after) = state.shared.consume(key, quantity) else {
            return;
        };
        if !Self::is_active(state, after.currency()) {
            return;
        }
        if let Some(row) = row {
            changes.push(BookChange::Removed(row));
            // Still resting with less left: the row comes back in place
            if !after.is_consumed() {
                changes.push(BookChange::Inserted(row));
            }
        }
    }
}

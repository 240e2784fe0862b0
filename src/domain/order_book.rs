// ============================================================================
// Order Book Domain Model
// ============================================================================

use super::ids::{Currency, TraderId};
use super::order::{Order, OrderKey, Side};
use crate::numeric::Amount;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Priority Key
// ============================================================================

/// Sort key giving price-time priority within one side.
///
/// Asks rank by ascending price, bids by descending price (stored negated),
/// then earlier timestamp, then trader id so the order is total.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PriorityKey {
    rank: Decimal,
    timestamp_ms: i64,
    trader: TraderId,
}

impl PriorityKey {
    fn of(order: &Order) -> Self {
        let price = order.price().value();
        Self {
            rank: match order.side() {
                Side::Ask => price,
                Side::Bid => -price,
            },
            timestamp_ms: order.timestamp().timestamp_millis(),
            trader: order.trader().clone(),
        }
    }
}

// ============================================================================
// Book Side
// ============================================================================

/// One side (asks or bids) of a single currency, kept in priority order.
#[derive(Debug, Clone)]
pub struct BookSide {
    side: Side,
    orders: BTreeMap<PriorityKey, Order>,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            orders: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Best order: lowest ask or highest bid, earliest first on ties.
    pub fn best(&self) -> Option<&Order> {
        self.orders.values().next()
    }

    /// Orders from best to worst.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn insert(&mut self, order: Order) {
        self.orders.insert(PriorityKey::of(&order), order);
    }

    fn remove(&mut self, key: &PriorityKey) -> Option<Order> {
        self.orders.remove(key)
    }

    fn get_mut(&mut self, key: &PriorityKey) -> Option<&mut Order> {
        self.orders.get_mut(key)
    }

    fn rank_of(&self, key: &PriorityKey) -> usize {
        self.orders.range(..key.clone()).count()
    }
}

// ============================================================================
// Currency Book
// ============================================================================

#[derive(Debug, Clone)]
struct CurrencyBook {
    asks: BookSide,
    bids: BookSide,
}

impl CurrencyBook {
    fn new() -> Self {
        Self {
            asks: BookSide::new(Side::Ask),
            bids: BookSide::new(Side::Bid),
        }
    }

    fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Ask => &self.asks,
            Side::Bid => &self.bids,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Ask => &mut self.asks,
            Side::Bid => &mut self.bids,
        }
    }

    fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }
}

// ============================================================================
// Order Book
// ============================================================================

/// Orders for every currency, each currency sorted by price-time priority.
///
/// The per-currency view is always read straight out of the sorted sides,
/// so it can never disagree with the underlying set.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    books: HashMap<Currency, CurrencyBook>,
    index: HashMap<OrderKey, (Currency, Side, PriorityKey)>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order; returns false if its key is already present.
    pub fn insert(&mut self, order: Order) -> bool {
        let key = order.key();
        if self.index.contains_key(&key) {
            return false;
        }

        let currency = order.currency().clone();
        let side = order.side();
        self.index
            .insert(key, (currency.clone(), side, PriorityKey::of(&order)));
        self.books
            .entry(currency)
            .or_insert_with(CurrencyBook::new)
            .side_mut(side)
            .insert(order);
        true
    }

    pub fn remove(&mut self, key: &OrderKey) -> Option<Order> {
        let (currency, side, priority) = self.index.remove(key)?;
        let book = self.books.get_mut(&currency)?;
        let order = book.side_mut(side).remove(&priority);
        if book.is_empty() {
            self.books.remove(&currency);
        }
        order
    }

    pub fn get(&self, key: &OrderKey) -> Option<&Order> {
        let (currency, side, priority) = self.index.get(key)?;
        self.books.get(currency)?.side(*side).orders.get(priority)
    }

    pub fn contains(&self, key: &OrderKey) -> bool {
        self.index.contains_key(key)
    }

    /// Consume `quantity` of a resting order, dropping it once nothing remains.
    ///
    /// Returns the order as it stands afterwards (consumed or not).
    pub fn consume(&mut self, key: &OrderKey, quantity: Amount) -> Option<Order> {
        let (currency, side, priority) = self.index.get(key)?.clone();
        let order = self
            .books
            .get_mut(&currency)?
            .side_mut(side)
            .get_mut(&priority)?;
        order.consume(quantity);
        let snapshot = order.clone();

        if snapshot.is_consumed() {
            self.remove(key);
        }
        Some(snapshot)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// One side of a currency, if any order for it exists.
    pub fn side(&self, currency: &Currency, side: Side) -> Option<&BookSide> {
        self.books.get(currency).map(|book| book.side(side))
    }

    pub fn best_ask(&self, currency: &Currency) -> Option<&Order> {
        self.side(currency, Side::Ask).and_then(BookSide::best)
    }

    pub fn best_bid(&self, currency: &Currency) -> Option<&Order> {
        self.side(currency, Side::Bid).and_then(BookSide::best)
    }

    /// Sorted view of one currency: asks best-first, then bids best-first.
    pub fn view(&self, currency: &Currency) -> Vec<Order> {
        match self.books.get(currency) {
            Some(book) => book.asks.iter().chain(book.bids.iter()).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Row index of an order inside its currency's view.
    pub fn position(&self, key: &OrderKey) -> Option<usize> {
        let (currency, side, priority) = self.index.get(key)?;
        let book = self.books.get(currency)?;
        Some(match side {
            Side::Ask => book.asks.rank_of(priority),
            Side::Bid => book.asks.len() + book.bids.rank_of(priority),
        })
    }

    /// Keys of orders stamped strictly before `cutoff_ms`.
    pub fn stale_keys(&self, cutoff_ms: i64) -> Vec<OrderKey> {
        self.index
            .keys()
            .filter(|key| key.timestamp_ms < cutoff_ms)
            .cloned()
            .collect()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.books
            .values()
            .flat_map(|book| book.asks.iter().chain(book.bids.iter()))
    }
}

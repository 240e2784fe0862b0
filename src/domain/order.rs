// ============================================================================
// Order Domain Model
// ============================================================================

use super::ids::{Currency, TraderId};
use crate::numeric::{validate_amount, Amount, Price, ValidationResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    /// Sell-side intent
    Ask,
    /// Buy-side intent
    Bid,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Ask => Side::Bid,
            Side::Bid => Side::Ask,
        }
    }
}

/// Identity of an order across the whole network.
///
/// Millisecond granularity: two orders from the same trader in the same
/// millisecond share a key and the second one is treated as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderKey {
    pub trader: TraderId,
    pub timestamp_ms: i64,
}

// ============================================================================
// Order Entity
// ============================================================================

/// One posted intent to buy or sell `amount` of a currency at `price`.
///
/// Everything except the consumption bookkeeping is fixed at creation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "OrderWire", into = "OrderWire"))]
pub struct Order {
    trader: TraderId,
    side: Side,
    currency: Currency,
    amount: Amount,
    price: Price,
    timestamp: DateTime<Utc>,
    remaining: Amount,
}

impl Order {
    /// Create an order stamped with the current time.
    pub fn new(
        trader: TraderId,
        side: Side,
        currency: Currency,
        amount: Amount,
        price: Price,
    ) -> ValidationResult<Self> {
        Self::with_timestamp(trader, side, currency, amount, price, Utc::now())
    }

    /// Create an order with an explicit timestamp (orders received from peers).
    pub fn with_timestamp(
        trader: TraderId,
        side: Side,
        currency: Currency,
        amount: Amount,
        price: Price,
        timestamp: DateTime<Utc>,
    ) -> ValidationResult<Self> {
        let amount = validate_amount(amount)?;
        Ok(Self {
            trader,
            side,
            currency,
            amount,
            price,
            timestamp,
            remaining: amount,
        })
    }

    /// Parse a price string and build the order in one step.
    pub fn parse(
        trader: TraderId,
        side: Side,
        currency: Currency,
        amount: Amount,
        price: &str,
        timestamp: DateTime<Utc>,
    ) -> ValidationResult<Self> {
        let price = Price::parse(price)?;
        Self::with_timestamp(trader, side, currency, amount, price, timestamp)
    }

    pub fn key(&self) -> OrderKey {
        OrderKey {
            trader: self.trader.clone(),
            timestamp_ms: self.timestamp.timestamp_millis(),
        }
    }

    pub fn trader(&self) -> &TraderId {
        &self.trader
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Amount originally posted.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn price(&self) -> &Price {
        &self.price
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Amount not yet consumed by matching.
    pub fn remaining(&self) -> Amount {
        self.remaining
    }

    pub fn is_consumed(&self) -> bool {
        self.remaining <= Decimal::ZERO
    }

    /// Consume up to `quantity`; returns what was actually consumed.
    pub(crate) fn consume(&mut self, quantity: Amount) -> Amount {
        let taken = quantity.min(self.remaining).max(Decimal::ZERO);
        self.remaining -= taken;
        taken
    }

    /// True when an incoming order at `self.price` crosses `resting`.
    pub fn crosses(&self, resting: &Order) -> bool {
        match self.side {
            Side::Bid => self.price >= resting.price,
            Side::Ask => self.price <= resting.price,
        }
    }
}

/// Encoding shared with peers. Consumption is local bookkeeping and never
/// leaves the node; decoding goes through the validating constructor.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct OrderWire {
    trader: TraderId,
    side: Side,
    currency: Currency,
    amount: Amount,
    price: Price,
    timestamp: DateTime<Utc>,
}

#[cfg(feature = "serde")]
impl TryFrom<OrderWire> for Order {
    type Error = crate::numeric::ValidationError;

    fn try_from(wire: OrderWire) -> Result<Self, Self::Error> {
        Self::with_timestamp(
            wire.trader,
            wire.side,
            wire.currency,
            wire.amount,
            wire.price,
            wire.timestamp,
        )
    }
}

#[cfg(feature = "serde")]
impl From<Order> for OrderWire {
    fn from(order: Order) -> Self {
        Self {
            trader: order.trader,
            side: order.side,
            currency: order.currency,
            amount: order.amount,
            price: order.price,
            timestamp: order.timestamp,
        }
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.trader == other.trader
            && self.timestamp.timestamp_millis() == other.timestamp.timestamp_millis()
    }
}

impl Eq for Order {}

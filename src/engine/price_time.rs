// ============================================================================
// Price/Time Priority Matching Algorithm
// Used to self-match the local trader's orders against their resting book
// ============================================================================

use crate::domain::{BookSide, Fill, Order};
use crate::interfaces::MatchingAlgorithm;
use rust_decimal::Decimal;

/// Price/Time Priority matching algorithm
///
/// Resting orders are taken best price first; among equal prices the
/// earliest timestamp goes first. Each execution happens at the resting
/// order's price.
///
/// # Example
/// ```text
/// Book:  Ask 5.0 x 1 (A, t=100)
///        Ask 5.0 x 2 (B, t=101)
///        Ask 5.5 x 4 (C, t=99)
///
/// Incoming: Bid 5.0 x 1.5
/// Result: 1.0 with A, then 0.5 with B; C never crosses
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct PriceTimePriority;

impl PriceTimePriority {
    pub fn new() -> Self {
        Self
    }
}

impl MatchingAlgorithm for PriceTimePriority {
    fn match_order(&self, incoming: &Order, opposite_side: &BookSide) -> Vec<Fill> {
        let mut fills = Vec::new();
        let mut remaining = incoming.remaining();

        for resting in opposite_side.iter() {
            if remaining <= Decimal::ZERO {
                break;
            }

            // Sides are sorted best-first: once one fails to cross, all later ones do
            if !self.prices_cross(incoming, resting) {
                break;
            }

            let quantity = remaining.min(resting.remaining());
            if quantity <= Decimal::ZERO {
                continue;
            }

            fills.push(Fill {
                resting: resting.key(),
                resting_side: resting.side(),
                price: resting.price().clone(),
                quantity,
            });
            remaining -= quantity;
        }

        fills
    }

    fn name(&self) -> &str {
        "PriceTime"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, OrderBook, Side, TraderId};
    use chrono::{TimeZone, Utc};

    fn order(side: Side, price: &str, amount: i64, ts_ms: i64) -> Order {
        Order::parse(
            TraderId::new("me").unwrap(),
            side,
            Currency::new("EUR").unwrap(),
            Decimal::from(amount),
            price,
            Utc.timestamp_millis_opt(ts_ms).unwrap(),
        )
        .unwrap()
    }

    fn book_with(orders: Vec<Order>) -> OrderBook {
        let mut book = OrderBook::new();
        for o in orders {
            book.insert(o);
        }
        book
    }

    #[test]
    fn test_price_time_fifo_order() {
        let first = order(Side::Ask, "5.0", 1, 100);
        let second = order(Side::Ask, "5.0", 1, 101);
        let book = book_with(vec![second.clone(), first.clone()]);
        let asks = book.side(first.currency(), Side::Ask).unwrap();

        let bid = order(Side::Bid, "5.0", 1, 200);
        let fills = PriceTimePriority::new().match_order(&bid, asks);

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].resting, first.key());
    }

    #[test]
    fn test_best_price_before_time() {
        let early_dear = order(Side::Ask, "5.5", 1, 99);
        let late_cheap = order(Side::Ask, "5.0", 1, 150);
        let book = book_with(vec![early_dear, late_cheap.clone()]);
        let asks = book.side(late_cheap.currency(), Side::Ask).unwrap();

        let bid = order(Side::Bid, "6.0", 1, 200);
        let fills = PriceTimePriority::new().match_order(&bid, asks);

        assert_eq!(fills[0].resting, late_cheap.key());
        assert_eq!(fills[0].price.as_str(), "5.0");
    }

    #[test]
    fn test_partial_fill_across_levels() {
        let a = order(Side::Ask, "5.0", 1, 100);
        let b = order(Side::Ask, "5.0", 2, 101);
        let c = order(Side::Ask, "5.5", 4, 99);
        let book = book_with(vec![a.clone(), b.clone(), c]);
        let asks = book.side(a.currency(), Side::Ask).unwrap();

        let mut bid = order(Side::Bid, "5.0", 2, 200);
        bid.consume(Decimal::new(5, 1)); // 1.5 left
        let fills = PriceTimePriority::new().match_order(&bid, asks);

        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].quantity, Decimal::ONE);
        assert_eq!(fills[1].resting, b.key());
        assert_eq!(fills[1].quantity, Decimal::new(5, 1));
    }

    #[test]
    fn test_no_cross() {
        let ask = order(Side::Ask, "5.0", 1, 100);
        let book = book_with(vec![ask.clone()]);
        let asks = book.side(ask.currency(), Side::Ask).unwrap();

        let bid = order(Side::Bid, "4.99", 1, 200);
        assert!(PriceTimePriority::new().match_order(&bid, asks).is_empty());
    }

    #[test]
    fn test_ask_takes_highest_bid() {
        let low = order(Side::Bid, "4.0", 1, 100);
        let high = order(Side::Bid, "4.5", 1, 101);
        let book = book_with(vec![low, high.clone()]);
        let bids = book.side(high.currency(), Side::Bid).unwrap();

        let ask = order(Side::Ask, "4.0", 1, 200);
        let fills = PriceTimePriority::new().match_order(&ask, bids);
        assert_eq!(fills[0].resting, high.key());
        assert_eq!(fills[0].resting_side, Side::Bid);
    }
}

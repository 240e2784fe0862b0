// ============================================================================
// Peer Exchange Library
// Peer-to-peer order book with multi-hop atomic payment settlement
// ============================================================================

//! # Peer Exchange
//!
//! Order book and settlement core for one peer of a decentralised exchange.
//!
//! ## Features
//!
//! - **Shared order book** holding every peer's orders in price-time priority,
//!   with deduplication and a freshness window
//! - **Local self-matching** of the node's own orders before they are published
//! - **Row-level change notifications** for a currency-filtered view
//! - **Multi-hop commit protocol** that moves a payment across a path of peers
//!   atomically, aborting on a NO vote, a timeout or a disconnect
//! - **Pluggable collaborators** for transport, ledger, routing and identity
//!
//! ## Example
//!
//! ```rust
//! use peer_exchange::prelude::*;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let me = PeerId::new("alice").unwrap();
//! let eur = Currency::new("EUR").unwrap();
//!
//! let engine = MatchingEngine::new(
//!     BookConfig::default(),
//!     Arc::new(StaticIdentity::new(me.clone())),
//!     Arc::new(NoOpPaymentSink),
//!     Arc::new(NoOpEventHandler),
//! );
//!
//! let ask = Order::new(me.clone(), Side::Ask, eur.clone(), Decimal::from(5), Price::parse("1.25").unwrap()).unwrap();
//! engine.submit(ask);
//!
//! let best = engine.best_ask(&eur).unwrap();
//! assert_eq!(best.price().as_str(), "1.25");
//! assert_eq!(engine.filtered_view(&eur).len(), 1);
//! ```

pub mod domain;
pub mod engine;
pub mod interfaces;
pub mod numeric;
pub mod protocol;
#[cfg(feature = "async")]
pub mod sweeper;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        BookConfig, Currency, ExchangeConfig, Order, OrderBook, OrderKey, Payment, PeerId,
        ProtocolConfig, Route, Side, TraderId, TxId,
    };
    pub use crate::engine::{BookChange, BookChanges, MatchingEngine, PriceTimePriority, SubmitOutcome};
    pub use crate::interfaces::{
        DirectRouter, EventHandler, ExchangeEvent, Identity, InMemoryLedger, Ledger,
        LoggingEventHandler, MatchingAlgorithm, NoOpEventHandler, NoOpPaymentSink, PaymentSink,
        QueuedTransport, Router, StaticIdentity, Transport,
    };
    pub use crate::numeric::{Amount, Price, ValidationError};
    pub use crate::protocol::{
        AbortReason, PeerFailure, ProtocolError, TransactionManager, TxHandle, TxItem, TxMessage,
        TxOutcome, TxPhase,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use smallvec::smallvec;
    use std::sync::Arc;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id).unwrap()
    }

    fn eur() -> Currency {
        Currency::new("EUR").unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn order(trader: &str, side: Side, price: &str, amount: i64, ts: DateTime<Utc>) -> Order {
        Order::parse(peer(trader), side, eur(), Decimal::from(amount), price, ts).unwrap()
    }

    struct Node {
        engine: MatchingEngine,
        manager: Arc<TransactionManager>,
        transport: Arc<QueuedTransport>,
        ledger: Arc<InMemoryLedger>,
    }

    fn node(name: &str) -> Node {
        let identity = Arc::new(StaticIdentity::new(peer(name)));
        let transport = Arc::new(QueuedTransport::new());
        let ledger = Arc::new(InMemoryLedger::new().with_capacity(eur(), Decimal::from(1_000)));
        let config = ExchangeConfig::default();
        let manager = Arc::new(
            TransactionManager::from_config(
                &config,
                identity.clone(),
                ledger.clone(),
                transport.clone(),
                Arc::new(NoOpEventHandler),
            )
            .unwrap(),
        );
        let engine = MatchingEngine::from_config(
            &config,
            identity,
            manager.clone(),
            Arc::new(NoOpEventHandler),
        )
        .unwrap();
        Node {
            engine,
            manager,
            transport,
            ledger,
        }
    }

    fn deliver(nodes: &[&Node]) {
        loop {
            let mut delivered = false;
            for from in nodes {
                for (to, item) in from.transport.drain() {
                    delivered = true;
                    if let Some(target) = nodes.iter().find(|n| n.manager.own_id() == &to) {
                        let _ = target.manager.handle_item_at(item, now());
                    }
                }
            }
            if !delivered {
                break;
            }
        }
    }

    #[test]
    fn test_self_match_settles_locally() {
        let alice = node("alice");
        alice
            .engine
            .submit_at(order("alice", Side::Ask, "2", 5, now()), now());
        let outcome = alice
            .engine
            .submit_at(order("alice", Side::Bid, "2", 5, now() + Duration::milliseconds(1)), now());

        assert!(matches!(outcome, SubmitOutcome::Matched { .. }));
        assert!(outcome.payments()[0].is_internal());
        assert!(alice.engine.is_empty());
        // Nothing crosses the network for a payment to oneself
        assert_eq!(alice.manager.active_count(), 0);
        assert!(alice.transport.is_empty());
    }

    #[test]
    fn test_order_gossip_then_multi_hop_settlement() {
        let alice = node("alice");
        let hop = node("hop");
        let bob = node("bob");

        // Bob's ask reaches every book; it never crosses anyone else's orders
        let ask = order("bob", Side::Ask, "1.5", 4, now());
        for n in [&alice, &hop, &bob] {
            n.engine.submit_at(ask.clone(), now());
            assert_eq!(n.engine.len(), 1);
        }
        // Re-broadcast is dropped
        assert_eq!(
            alice.engine.submit_at(ask.clone(), now()),
            SubmitOutcome::Duplicate
        );

        // Alice takes the offer and settles 6 EUR through the hop
        let value = ask.price().notional(ask.amount()).unwrap();
        let payment = Payment::new(value, eur(), peer("alice"), peer("bob"), smallvec![peer("hop")]);
        let handle = alice.manager.init_coordinator_at(payment, now()).unwrap();
        deliver(&[&alice, &hop, &bob]);

        assert_eq!(handle.try_outcome(), Some(TxOutcome::Committed));
        for n in [&alice, &hop, &bob] {
            assert_eq!(n.manager.active_count(), 0);
            assert_eq!(n.ledger.transfers().len(), 1);
            assert_eq!(n.ledger.transfers()[0].amount, Decimal::from(6));
        }
        assert_eq!(alice.ledger.available(&eur()), Decimal::from(994));
    }

    #[test]
    fn test_example_best_prices_scenario() {
        let alice = node("alice");
        let eur = eur();
        alice.engine.set_currency(eur.clone());
        let changes = alice.engine.subscribe();

        alice
            .engine
            .submit_at(order("carol", Side::Ask, "1.10", 3, now()), now());
        alice.engine.submit_at(
            order("dave", Side::Ask, "1.05", 3, now() + Duration::milliseconds(1)),
            now(),
        );
        alice.engine.submit_at(
            order("erin", Side::Bid, "1.00", 3, now() + Duration::milliseconds(2)),
            now(),
        );

        let view = alice.engine.filtered_view(&eur);
        let prices: Vec<_> = view.iter().map(|o| o.price().as_str().to_string()).collect();
        assert_eq!(prices, vec!["1.05", "1.10", "1.00"]);

        let seen: Vec<_> = changes.collect();
        assert_eq!(
            seen,
            vec![
                BookChange::Reset,
                BookChange::Inserted(0),
                BookChange::Inserted(0),
                BookChange::Inserted(2),
            ]
        );
    }

    fn side_strategy() -> impl Strategy<Value = Side> {
        prop_oneof![Just(Side::Ask), Just(Side::Bid)]
    }

    proptest! {
        #[test]
        fn prop_view_is_price_time_sorted(
            orders in prop::collection::vec((side_strategy(), 1u32..500, 0i64..10_000, 0usize..4), 1..40)
        ) {
            let alice = node("alice");
            let traders = ["bob", "carol", "dave", "erin"];
            for (side, cents, offset, trader) in &orders {
                let price = Decimal::new(*cents as i64, 2).to_string();
                let o = order(traders[*trader], *side, &price, 1, now() + Duration::milliseconds(*offset));
                alice.engine.submit_at(o, now());
            }

            let view = alice.engine.filtered_view(&eur());
            let split = view.iter().position(|o| o.side() == Side::Bid).unwrap_or(view.len());
            let (asks, bids) = view.split_at(split);
            prop_assert!(bids.iter().all(|o| o.side() == Side::Bid));

            for pair in asks.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.price() < b.price() || (a.price() == b.price() && a.timestamp() <= b.timestamp()));
            }
            for pair in bids.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.price() > b.price() || (a.price() == b.price() && a.timestamp() <= b.timestamp()));
            }
        }

        #[test]
        fn prop_freshness_window_admission(age_minutes in -180i64..(4 * 24 * 60)) {
            let alice = node("alice");
            let ts = now() - Duration::minutes(age_minutes);
            let outcome = alice.engine.submit_at(order("bob", Side::Ask, "1", 1, ts), now());

            let fresh = age_minutes <= 2 * 24 * 60 && age_minutes >= -60;
            prop_assert_eq!(outcome != SubmitOutcome::Expired, fresh);
            prop_assert_eq!(alice.engine.len(), usize::from(fresh));
        }

        #[test]
        fn prop_resubmission_never_duplicates(copies in 1usize..6) {
            let alice = node("alice");
            let o = order("bob", Side::Bid, "3.5", 2, now());
            for _ in 0..copies {
                alice.engine.submit_at(o.clone(), now());
            }
            prop_assert_eq!(alice.engine.len(), 1);
        }
    }
}

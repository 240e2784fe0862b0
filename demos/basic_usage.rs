// ============================================================================
// Basic Usage Example
// ============================================================================

use peer_exchange::prelude::*;
use rust_decimal::Decimal;
use smallvec::smallvec;
use std::sync::Arc;
use std::time::Duration;

struct Node {
    manager: Arc<TransactionManager>,
    transport: Arc<QueuedTransport>,
    ledger: Arc<InMemoryLedger>,
}

fn node(id: &PeerId, eur: &Currency, capacity: i64) -> Node {
    let transport = Arc::new(QueuedTransport::new());
    let ledger = Arc::new(InMemoryLedger::new().with_capacity(eur.clone(), Decimal::from(capacity)));
    let manager = Arc::new(
        TransactionManager::from_config(
            &ExchangeConfig::lan(),
            Arc::new(StaticIdentity::new(id.clone())),
            ledger.clone(),
            transport.clone(),
            Arc::new(LoggingEventHandler),
        )
        .unwrap(),
    );
    Node {
        manager,
        transport,
        ledger,
    }
}

/// Move queued items between nodes until every outbox is empty.
fn deliver(nodes: &[&Node]) {
    loop {
        let mut moved = false;
        for from in nodes {
            for (to, item) in from.transport.drain() {
                moved = true;
                if let Some(target) = nodes.iter().find(|n| n.manager.own_id() == &to) {
                    if let Err(err) = target.manager.handle_item(item) {
                        println!("  {} rejected an item: {}", to, err);
                    }
                }
            }
        }
        if !moved {
            break;
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    println!("=== Peer Exchange Example ===\n");

    let eur = Currency::new("EUR").unwrap();
    let alice = PeerId::new("alice").unwrap();
    let carol = PeerId::new("carol").unwrap();
    let bob = PeerId::new("bob").unwrap();

    // ------------------------------------------------------------------
    // Order book
    // ------------------------------------------------------------------
    let engine = MatchingEngine::from_config(
        &ExchangeConfig::lan().with_currency(eur.clone()),
        Arc::new(StaticIdentity::new(alice.clone())),
        Arc::new(NoOpPaymentSink),
        Arc::new(LoggingEventHandler),
    )
    .unwrap();
    let changes = engine.subscribe();

    println!("Adding orders from remote peers...");
    for (i, price) in ["1.10", "1.05", "1.20"].iter().enumerate() {
        let ask = Order::new(bob.clone(), Side::Ask, eur.clone(), Decimal::from(10), Price::parse(price).unwrap()).unwrap();
        engine.submit(ask);
        std::thread::sleep(Duration::from_millis(2 + i as u64));
    }
    let bid = Order::new(carol.clone(), Side::Bid, eur.clone(), Decimal::from(4), Price::parse("1.00").unwrap()).unwrap();
    engine.submit(bid);

    println!("\n=== Shared Book (EUR) ===");
    for order in engine.filtered_view(&eur) {
        println!(
            "  {:?} {} @ {} from {}",
            order.side(),
            order.remaining(),
            order.price(),
            order.trader()
        );
    }
    println!("\nRow changes: {:?}", changes.collect::<Vec<_>>());

    println!("\n=== Local Self-Match ===");
    let own_ask = Order::new(alice.clone(), Side::Ask, eur.clone(), Decimal::from(2), Price::parse("0.90").unwrap()).unwrap();
    engine.submit(own_ask);
    std::thread::sleep(Duration::from_millis(2));
    let own_bid = Order::new(alice.clone(), Side::Bid, eur.clone(), Decimal::from(2), Price::parse("0.95").unwrap()).unwrap();
    let outcome = engine.submit(own_bid);
    for payment in outcome.payments() {
        println!("  payment of {} {} (internal: {})", payment.amount, payment.currency, payment.is_internal());
    }

    // ------------------------------------------------------------------
    // Settlement across a hop
    // ------------------------------------------------------------------
    println!("\n=== Settlement alice -> carol -> bob ===");
    let nodes = [node(&alice, &eur, 100), node(&carol, &eur, 100), node(&bob, &eur, 100)];
    let payment = Payment::new(Decimal::from(12), eur.clone(), alice.clone(), bob.clone(), smallvec![carol.clone()]);
    let handle = nodes[0].manager.init_coordinator(payment).unwrap();
    deliver(&[&nodes[0], &nodes[1], &nodes[2]]);
    println!("  {} -> {:?}", handle.tx_id(), handle.wait(Duration::from_millis(100)));

    println!("\n=== Settlement with an exhausted hop ===");
    let poor = node(&carol, &eur, 5);
    let payment = Payment::new(Decimal::from(12), eur.clone(), alice.clone(), bob.clone(), smallvec![carol.clone()]);
    let handle = nodes[0].manager.init_coordinator(payment).unwrap();
    deliver(&[&nodes[0], &poor, &nodes[2]]);
    println!("  {} -> {:?}", handle.tx_id(), handle.wait(Duration::from_millis(100)));

    println!("\nBalances:");
    for n in &nodes {
        println!(
            "  {}: {} EUR available, {} transfers",
            n.manager.own_id(),
            n.ledger.available(&eur),
            n.ledger.transfers().len()
        );
    }

    println!("\n=== Example Complete ===");
}

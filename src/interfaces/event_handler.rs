// ============================================================================
// Event Handler Interface
// Observability side channel for order and transaction events
// ============================================================================

use crate::domain::{OrderKey, Payment, PeerId, TxId};
use crate::protocol::{AbortReason, PeerFailure, Role, TxPhase};
use crossbeam::channel::{unbounded, Receiver, Sender};
use chrono::{DateTime, Utc};

/// Events emitted by the matching engine and the transaction manager
#[derive(Debug, Clone)]
pub enum ExchangeEvent {
    /// Order entered the shared book
    OrderAccepted {
        key: OrderKey,
        timestamp: DateTime<Utc>,
    },

    /// Order failed validation or freshness checks
    OrderRejected {
        key: OrderKey,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Order key already known; dropped
    OrderDuplicate {
        key: OrderKey,
        timestamp: DateTime<Utc>,
    },

    /// Local self-match produced a payment
    OrderMatched {
        key: OrderKey,
        payment: Payment,
        timestamp: DateTime<Utc>,
    },

    /// Order left the shared book (cancelled or consumed)
    OrderRemoved {
        key: OrderKey,
        timestamp: DateTime<Utc>,
    },

    /// Order swept out after its freshness window
    OrderExpired {
        key: OrderKey,
        timestamp: DateTime<Utc>,
    },

    /// A transaction changed phase on this node
    TxPhaseChanged {
        tx_id: TxId,
        role: Role,
        from: TxPhase,
        to: TxPhase,
        timestamp: DateTime<Utc>,
    },

    /// Transaction reached ACK_COMMIT on this node
    TxCommitted {
        tx_id: TxId,
        role: Role,
        timestamp: DateTime<Utc>,
    },

    /// Transaction reached ABORT on this node
    TxAborted {
        tx_id: TxId,
        role: Role,
        reason: AbortReason,
        timestamp: DateTime<Utc>,
    },

    /// A neighbour timed out, vanished or broke protocol; for reputation/audit
    PeerFailed {
        tx_id: TxId,
        peer: PeerId,
        failure: PeerFailure,
        timestamp: DateTime<Utc>,
    },
}

/// Event handler trait for processing exchange events
///
/// Called inline on the emitting thread, after locks are released.
/// Implementations must not block.
pub trait EventHandler: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: ExchangeEvent);

    /// Batch event handler (optional optimization)
    fn on_events(&self, events: Vec<ExchangeEvent>) {
        for event in events {
            self.on_event(event);
        }
    }
}

/// No-op event handler for testing
pub struct NoOpEventHandler;

impl EventHandler for NoOpEventHandler {
    fn on_event(&self, _event: ExchangeEvent) {}
}

/// Logging event handler
pub struct LoggingEventHandler;

impl EventHandler for LoggingEventHandler {
    fn on_event(&self, event: ExchangeEvent) {
        tracing::debug!("Exchange event: {:?}", event);
    }
}

/// Forwards events into an unbounded channel so consumers run elsewhere.
pub struct ChannelEventHandler {
    sender: Sender<ExchangeEvent>,
}

impl ChannelEventHandler {
    pub fn new() -> (Self, Receiver<ExchangeEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl EventHandler for ChannelEventHandler {
    fn on_event(&self, event: ExchangeEvent) {
        // Receiver gone means nobody is listening any more
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TraderId;

    fn key() -> OrderKey {
        OrderKey {
            trader: TraderId::new("alice").unwrap(),
            timestamp_ms: 1,
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpEventHandler;
        handler.on_event(ExchangeEvent::OrderAccepted {
            key: key(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_channel_handler_delivers_in_order() {
        let (handler, events) = ChannelEventHandler::new();
        handler.on_events(vec![
            ExchangeEvent::OrderAccepted {
                key: key(),
                timestamp: Utc::now(),
            },
            ExchangeEvent::OrderRemoved {
                key: key(),
                timestamp: Utc::now(),
            },
        ]);

        assert!(matches!(
            events.try_recv(),
            Ok(ExchangeEvent::OrderAccepted { .. })
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(ExchangeEvent::OrderRemoved { .. })
        ));
    }

    #[test]
    fn test_channel_handler_survives_dropped_receiver() {
        let (handler, events) = ChannelEventHandler::new();
        drop(events);
        handler.on_event(ExchangeEvent::OrderDuplicate {
            key: key(),
            timestamp: Utc::now(),
        });
    }
}

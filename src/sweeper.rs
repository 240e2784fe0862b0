// ============================================================================
// Sweeper
// Periodic freshness and reply-timeout sweeps on a tokio interval
// ============================================================================

use crate::engine::MatchingEngine;
use crate::protocol::TransactionManager;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_orders: usize,
    pub timed_out_transactions: usize,
}

/// Run both sweeps once against `now`.
pub fn sweep_once(
    engine: &MatchingEngine,
    manager: &TransactionManager,
    now: DateTime<Utc>,
) -> SweepReport {
    SweepReport {
        expired_orders: engine.expire_stale(now).len(),
        timed_out_transactions: manager.check_timeouts(now),
    }
}

/// Sweep every `period` until `shutdown` flips to true or its sender drops.
pub async fn run_sweeper(
    engine: Arc<MatchingEngine>,
    manager: Arc<TransactionManager>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(?period, "sweeper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = sweep_once(&engine, &manager, Utc::now());
                if report != SweepReport::default() {
                    debug!(
                        expired = report.expired_orders,
                        timed_out = report.timed_out_transactions,
                        "sweep"
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("sweeper stopped");
}

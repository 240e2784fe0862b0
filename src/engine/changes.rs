// ============================================================================
// Book Change Notifications
// Row-level change stream for whoever renders the active currency's view
// ============================================================================

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::time::Duration;

/// A row-level change to the active currency's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookChange {
    /// A row now exists at this index; later rows shifted down
    Inserted(usize),
    /// The row at this index is gone; later rows shifted up
    Removed(usize),
    /// Re-read the whole view
    Reset,
}

/// Subscription to book changes.
///
/// Iterating yields whatever changes are pending and returns `None` once
/// caught up; iterate again later to pick up newer changes. Every
/// subscription starts with `Reset`, so a consumer that lost track can
/// simply subscribe again.
pub struct BookChanges {
    receiver: Receiver<BookChange>,
}

impl BookChanges {
    /// Wait up to `timeout` for the next change.
    pub fn next_timeout(&self, timeout: Duration) -> Option<BookChange> {
        match self.receiver.recv_timeout(timeout) {
            Ok(change) => Some(change),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything pending right now.
    pub fn pending(&self) -> Vec<BookChange> {
        self.receiver.try_iter().collect()
    }
}

impl Iterator for BookChanges {
    type Item = BookChange;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.try_recv().ok()
    }
}

/// Fan-out of changes to every live subscription.
#[derive(Default)]
pub(crate) struct ChangeHub {
    subscribers: Mutex<Vec<Sender<BookChange>>>,
}

impl ChangeHub {
    pub(crate) fn subscribe(&self) -> BookChanges {
        let (sender, receiver) = unbounded();
        // Cannot fail: the receiver is still in hand
        let _ = sender.send(BookChange::Reset);
        self.subscribers.lock().push(sender);
        BookChanges { receiver }
    }

    /// Deliver changes in order; subscriptions that were dropped are pruned.
    pub(crate) fn publish(&self, changes: &[BookChange]) {
        if changes.is_empty() {
            return;
        }
        self.subscribers.lock().retain(|subscriber| {
            changes
                .iter()
                .all(|change| subscriber.send(*change).is_ok())
        });
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

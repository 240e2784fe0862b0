// ============================================================================
// Matching Algorithm Interface
// Defines the contract for pluggable self-matching algorithms
// ============================================================================

use crate::domain::{BookSide, Fill, Order};

/// Strategy pattern interface for matching algorithms
pub trait MatchingAlgorithm: Send + Sync {
    /// Match an incoming order against the opposite side of a book.
    ///
    /// Pure: returns the fills that should happen, best resting order first,
    /// without touching the book. The caller applies them.
    fn match_order(&self, incoming: &Order, opposite_side: &BookSide) -> Vec<Fill>;

    /// Get the algorithm name for logging
    fn name(&self) -> &str;

    /// Check if the incoming order crosses a resting order
    fn prices_cross(&self, incoming: &Order, resting: &Order) -> bool {
        incoming.side() != resting.side() && incoming.crosses(resting)
    }
}

// ============================================================================
// Engine Module
// Contains the order book engine business logic
// ============================================================================

mod changes;
mod matching_engine;
mod price_time;

pub use changes::{BookChange, BookChanges};
pub use matching_engine::{MatchingEngine, SubmitOutcome};
pub use price_time::PriceTimePriority;

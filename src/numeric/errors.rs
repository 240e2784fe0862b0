// ============================================================================
// Validation Errors
// Rejections raised while constructing prices, amounts and orders
// ============================================================================

use thiserror::Error;

/// Errors that reject a value before it reaches any book.
///
/// These are never faults: the submitter simply gets a negative answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Price text could not be parsed or is not strictly positive
    #[error("malformed price: {0:?}")]
    MalformedPrice(String),

    /// Amount is zero or negative
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(String),

    /// Currency symbol is empty or contains non-alphanumeric characters
    #[error("invalid currency symbol: {0:?}")]
    InvalidCurrency(String),

    /// Peer identifier is empty
    #[error("peer identifier cannot be empty")]
    EmptyPeerId,

    /// Arithmetic on a price or amount left the representable range
    #[error("arithmetic overflow")]
    Overflow,
}

/// Result type alias for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

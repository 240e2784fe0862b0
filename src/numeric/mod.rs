// ============================================================================
// Numeric Module
// Decimal-accurate prices and amounts
// ============================================================================
//
// This module provides:
// - Price: posted price text kept together with its parsed Decimal
// - Amount: Decimal alias for quantities and payment values
// - ValidationError: rejections raised while building orders
//
// No floating-point values are used anywhere in matching or settlement.

mod errors;
mod price;

pub use errors::{ValidationError, ValidationResult};
pub use price::{validate_amount, Amount, Price};

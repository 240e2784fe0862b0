// ============================================================================
// Price
// Posted price text paired with its parsed decimal value
// ============================================================================

use super::errors::{ValidationError, ValidationResult};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Amounts are plain decimals; only prices carry their posted text.
pub type Amount = Decimal;

/// A strictly positive price.
///
/// The text a peer posted is kept verbatim so it can be echoed back exactly,
/// while all comparisons use the parsed value. Both are fixed when the price
/// is parsed and there is no way to change one without the other.
///
/// # Example
/// ```
/// use peer_exchange::numeric::Price;
/// use rust_decimal::Decimal;
///
/// let price: Price = "5.10".parse().unwrap();
/// assert_eq!(price.as_str(), "5.10");
/// assert_eq!(price.value(), Decimal::new(51, 1));
/// ```
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Price {
    text: Arc<str>,
    value: Decimal,
}

impl Price {
    /// Parse a posted price string.
    ///
    /// # Errors
    /// `MalformedPrice` if the text is not a decimal number or is not > 0.
    pub fn parse(text: &str) -> ValidationResult<Self> {
        let trimmed = text.trim();
        let value = Decimal::from_str(trimmed)
            .map_err(|_| ValidationError::MalformedPrice(text.to_string()))?;

        if value <= Decimal::ZERO {
            return Err(ValidationError::MalformedPrice(text.to_string()));
        }

        Ok(Self {
            text: Arc::from(trimmed),
            value,
        })
    }

    /// Build a price from a decimal; the text is the decimal's canonical form.
    pub fn from_decimal(value: Decimal) -> ValidationResult<Self> {
        if value <= Decimal::ZERO {
            return Err(ValidationError::MalformedPrice(value.to_string()));
        }
        Ok(Self {
            text: Arc::from(value.to_string()),
            value,
        })
    }

    #[inline]
    pub fn value(&self) -> Decimal {
        self.value
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Value of `amount` units at this price.
    pub fn notional(&self, amount: Amount) -> ValidationResult<Amount> {
        self.value
            .checked_mul(amount)
            .ok_or(ValidationError::Overflow)
    }
}

impl FromStr for Price {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Price {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Price> for String {
    fn from(price: Price) -> Self {
        price.text.to_string()
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Price {}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for Price {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Decimal's Hash is scale-insensitive, matching Eq
        self.value.hash(state);
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price({})", self.text)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Check that an amount is strictly positive.
pub fn validate_amount(amount: Amount) -> ValidationResult<Amount> {
    if amount <= Decimal::ZERO {
        Err(ValidationError::NonPositiveAmount(amount.to_string()))
    } else {
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_text_and_value() {
        let price = Price::parse("5.10").unwrap();
        assert_eq!(price.as_str(), "5.10");
        assert_eq!(price.value(), Decimal::new(51, 1));
        assert_eq!(price.to_string(), "5.10");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let price = Price::parse("  12 ").unwrap();
        assert_eq!(price.as_str(), "12");
        assert_eq!(price.value(), Decimal::from(12));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            Price::parse("abc"),
            Err(ValidationError::MalformedPrice(_))
        ));
        assert!(Price::parse("").is_err());
        assert!(Price::parse("0").is_err());
        assert!(Price::parse("-1.5").is_err());
    }

    #[test]
    fn test_equality_ignores_trailing_zeros() {
        let a = Price::parse("5.0").unwrap();
        let b = Price::parse("5").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_ordering() {
        let low = Price::parse("4.99").unwrap();
        let high = Price::parse("5.01").unwrap();
        assert!(low < high);
    }

    #[test]
    fn test_notional() {
        let price = Price::parse("2.5").unwrap();
        assert_eq!(price.notional(Decimal::from(4)).unwrap(), Decimal::from(10));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::ONE).is_ok());
        assert!(matches!(
            validate_amount(Decimal::ZERO),
            Err(ValidationError::NonPositiveAmount(_))
        ));
    }
}

// ============================================================================
// Identifier Value Objects
// ============================================================================

use crate::numeric::{ValidationError, ValidationResult};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identity of a peer on the network.
///
/// Cheap to clone: the identifier text is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct PeerId(Arc<str>);

/// Traders are peers; the alias documents intent at call sites.
pub type TraderId = PeerId;

impl PeerId {
    pub fn new(id: impl AsRef<str>) -> ValidationResult<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(ValidationError::EmptyPeerId);
        }
        Ok(Self(Arc::from(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PeerId {
    type Error = ValidationError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0.to_string()
    }
}

/// Currency symbol, normalised to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Currency(Arc<str>);

impl Currency {
    pub fn new(symbol: impl AsRef<str>) -> ValidationResult<Self> {
        let symbol = symbol.as_ref().trim();
        if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidCurrency(symbol.to_string()));
        }
        Ok(Self(Arc::from(symbol.to_ascii_uppercase())))
    }

    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(symbol: String) -> Result<Self, Self::Error> {
        Self::new(symbol)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier: the coordinator's id plus its local sequence.
///
/// The sequence is only unique per origin; pairing it with the origin makes
/// the identifier unique across the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TxId {
    pub origin: PeerId,
    pub sequence: u64,
}

impl TxId {
    pub fn new(origin: PeerId, sequence: u64) -> Self {
        Self { origin, sequence }
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.sequence)
    }
}

// ============================================================================
// Exchange Configuration
// Order freshness limits and commit protocol timing
// ============================================================================

use super::ids::Currency;
use chrono::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Book Configuration
// ============================================================================

/// Admission rules for the order book.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BookConfig {
    /// Orders older than this are rejected and swept from the book
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub freshness_window: Duration,

    /// Orders stamped further than this into the future are rejected
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub max_future_skew: Duration,

    /// Currency whose rows are shown and signalled initially
    pub initial_currency: Option<Currency>,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::days(2),
            max_future_skew: Duration::hours(1),
            initial_currency: None,
        }
    }
}

impl BookConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.freshness_window <= Duration::zero() {
            return Err("Freshness window must be positive".to_string());
        }

        if self.freshness_window > max_duration() {
            return Err("Freshness window cannot exceed one year".to_string());
        }

        if self.max_future_skew < Duration::zero() || self.max_future_skew > max_duration() {
            return Err("Future skew must be between zero and one year".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Protocol Configuration
// ============================================================================

/// Timing of the multi-hop commit protocol.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProtocolConfig {
    /// Longest wait for any reply from a neighbour before aborting
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub reply_timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::seconds(30),
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.reply_timeout <= Duration::zero() || self.reply_timeout > max_duration() {
            return Err("Reply timeout must be positive and at most one year".to_string());
        }
        Ok(())
    }
}

/// Upper bound for every configured duration
fn max_duration() -> Duration {
    Duration::days(365)
}

// ============================================================================
// Complete Configuration
// ============================================================================

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExchangeConfig {
    pub book: BookConfig,
    pub protocol: ProtocolConfig,
}

impl ExchangeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: Set the order freshness window
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.book.freshness_window = window;
        self
    }

    /// Builder method: Set the tolerated future clock skew
    pub fn with_max_future_skew(mut self, skew: Duration) -> Self {
        self.book.max_future_skew = skew;
        self
    }

    /// Builder method: Set the reply timeout
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.protocol.reply_timeout = timeout;
        self
    }

    /// Builder method: Set the initially displayed currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.book.initial_currency = Some(currency);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.book.validate()?;
        self.protocol.validate()
    }
}

// ============================================================================
// Preset Configurations
// ============================================================================

impl ExchangeConfig {
    /// Peers on a local network: same admission rules, replies expected fast.
    pub fn lan() -> Self {
        Self::new().with_reply_timeout(Duration::seconds(2))
    }
}

// chrono durations travel as whole milliseconds
#[cfg(feature = "serde")]
mod millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::milliseconds)
    }
}

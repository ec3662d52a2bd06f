//! On-chain event model shared by the feeds and alert layers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monitored event category.
/// Each class owns its own cursor, subscriber set and polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    /// Token transfers into a burn address.
    Burn,
    /// Large token transfers out of a liquidity pool.
    BigBuy,
}

impl EventClass {
    /// All classes, in monitor start order.
    pub const ALL: [EventClass; 2] = [EventClass::Burn, EventClass::BigBuy];

    /// Stable identifier used for persistence and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            EventClass::Burn => "burn",
            EventClass::BigBuy => "big_buy",
        }
    }

    /// Parse the persistence identifier.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "burn" => Some(EventClass::Burn),
            "big_buy" => Some(EventClass::BigBuy),
            _ => None,
        }
    }

    /// Which side of a transfer the watched addresses sit on.
    #[inline]
    pub fn direction(self) -> TransferDirection {
        match self {
            EventClass::Burn => TransferDirection::Incoming,
            EventClass::BigBuy => TransferDirection::Outgoing,
        }
    }

    /// Whether scans of this class filter on a fiat-derived amount threshold.
    #[inline]
    pub fn uses_threshold(self) -> bool {
        matches!(self, EventClass::BigBuy)
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer direction relative to the watched address set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
    /// Watched address is the receiver.
    Incoming,
    /// Watched address is the sender.
    Outgoing,
}

/// Class-specific event metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventDetail {
    Burn {
        /// Token decimals reported with the transfer.
        decimals: u32,
    },
    Buy {
        /// Contract method that moved the tokens (e.g. `swap`).
        method: Option<String>,
    },
}

/// A single token transfer observed on chain.
/// Immutable once fetched; never stored beyond the batch it came in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Transaction hash. May be empty when the source omitted it.
    pub id: String,
    /// Amount in whole token units.
    pub amount: Decimal,
    /// Sender address.
    pub from: Option<String>,
    /// Receiver address.
    pub to: Option<String>,
    /// Block timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Block number, when reported.
    pub block_number: Option<u64>,
    /// Log index inside the block, when reported.
    pub log_index: Option<u64>,
    pub detail: EventDetail,
}

impl ChainEvent {
    /// Whether the identifier can take part in cursor matching.
    #[inline]
    pub fn has_valid_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Which class this event belongs to.
    pub fn class(&self) -> EventClass {
        match self.detail {
            EventDetail::Burn { .. } => EventClass::Burn,
            EventDetail::Buy { .. } => EventClass::BigBuy,
        }
    }

    /// Interaction method for buys, defaulting to `swap`.
    pub fn method(&self) -> &str {
        match &self.detail {
            EventDetail::Buy {
                method: Some(method),
            } if !method.is_empty() => method,
            _ => "swap",
        }
    }

    /// Ordering key for merging feeds: newer events compare greater.
    pub fn recency_key(&self) -> (Option<DateTime<Utc>>, Option<u64>, Option<u64>) {
        (self.timestamp, self.block_number, self.log_index)
    }

    /// Minimal burn event, mostly useful for tests and mocks.
    pub fn burn(id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: id.into(),
            amount,
            from: None,
            to: None,
            timestamp: None,
            block_number: None,
            log_index: None,
            detail: EventDetail::Burn { decimals: 18 },
        }
    }

    /// Minimal buy event, mostly useful for tests and mocks.
    pub fn buy(id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            detail: EventDetail::Buy { method: None },
            ..Self::burn(id, amount)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_class_names_roundtrip() {
        for class in EventClass::ALL {
            assert_eq!(EventClass::from_name(class.as_str()), Some(class));
        }
        assert_eq!(EventClass::from_name("mint"), None);
    }

    #[test]
    fn test_event_class_direction() {
        assert_eq!(EventClass::Burn.direction(), TransferDirection::Incoming);
        assert_eq!(EventClass::BigBuy.direction(), TransferDirection::Outgoing);
        assert!(EventClass::BigBuy.uses_threshold());
        assert!(!EventClass::Burn.uses_threshold());
    }

    #[test]
    fn test_valid_id() {
        assert!(ChainEvent::burn("0xabc", Decimal::ONE).has_valid_id());
        assert!(!ChainEvent::burn("", Decimal::ONE).has_valid_id());
        assert!(!ChainEvent::burn("   ", Decimal::ONE).has_valid_id());
    }

    #[test]
    fn test_method_defaults_to_swap() {
        let mut event = ChainEvent::buy("0x1", Decimal::ONE);
        assert_eq!(event.method(), "swap");
        event.detail = EventDetail::Buy {
            method: Some("swapExactETHForTokens".to_string()),
        };
        assert_eq!(event.method(), "swapExactETHForTokens");
        assert_eq!(event.class(), EventClass::BigBuy);
    }
}

//! Token price snapshot from the price oracle.

use crate::threshold::{self, ThresholdError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest known token price.
/// Fields the feed omitted or could not be parsed are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Unit price in USD.
    pub price_usd: Option<Decimal>,
    /// Unit price in the chain's native coin (WCO).
    pub price_wco: Option<Decimal>,
    /// Market capitalisation in USD.
    pub market_cap: Option<Decimal>,
    /// Feed timestamp as reported upstream.
    pub last_updated: Option<String>,
}

impl PriceQuote {
    /// Quote with only a USD price.
    pub fn usd(price: Decimal) -> Self {
        Self {
            price_usd: Some(price),
            ..Default::default()
        }
    }

    /// USD price if strictly positive.
    pub fn usable_usd(&self) -> Option<Decimal> {
        self.price_usd.filter(|p| *p > Decimal::ZERO)
    }

    /// WCO price if strictly positive.
    pub fn usable_wco(&self) -> Option<Decimal> {
        self.price_wco.filter(|p| *p > Decimal::ZERO)
    }

    /// USD value of a token amount.
    pub fn usd_value(&self, amount: Decimal) -> Option<Decimal> {
        self.usable_usd().and_then(|p| amount.checked_mul(p))
    }

    /// WCO value of a token amount.
    pub fn wco_value(&self, amount: Decimal) -> Option<Decimal> {
        self.usable_wco().and_then(|p| amount.checked_mul(p))
    }

    /// Token amount worth `fiat_threshold` USD at this quote.
    pub fn token_threshold(&self, fiat_threshold: Decimal) -> Result<Decimal, ThresholdError> {
        threshold::resolve(fiat_threshold, self.price_usd)
    }
}

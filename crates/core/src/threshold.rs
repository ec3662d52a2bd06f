//! Fiat to token threshold conversion.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("Token price unavailable")]
    Unavailable,
}

/// Convert a fiat threshold into a token amount at the given unit price.
///
/// Fails when the price is missing or not strictly positive. Pure: the
/// result is never cached here, callers resolve again on every decision.
pub fn resolve(fiat_threshold: Decimal, price: Option<Decimal>) -> Result<Decimal, ThresholdError> {
    let price = price.ok_or(ThresholdError::Unavailable)?;
    if price <= Decimal::ZERO {
        return Err(ThresholdError::Unavailable);
    }
    fiat_threshold
        .checked_div(price)
        .map(|amount| amount.normalize())
        .ok_or(ThresholdError::Unavailable)
}

/// Resolve from a raw price string as delivered by a price feed.
pub fn resolve_raw(fiat_threshold: Decimal, raw_price: Option<&str>) -> Result<Decimal, ThresholdError> {
    resolve(fiat_threshold, raw_price.and_then(parse_decimal))
}

/// Lenient decimal parsing for feed values: plain or scientific notation.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

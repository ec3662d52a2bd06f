//! Token amount normalisation and display formatting.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Decimals assumed when a transfer does not report them.
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// Significant digits a `Decimal` can always hold.
const MAX_DIGITS: usize = 28;

/// Convert a raw on-chain integer amount into whole token units.
///
/// Returns zero for values that are not plain non-negative integers or whose
/// integer part cannot be represented. Fractional digits beyond the
/// representable precision are truncated.
pub fn normalize_token_amount(raw: &str, decimals: u32) -> Decimal {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Decimal::ZERO;
    }
    let digits = raw.trim_start_matches('0');
    if digits.is_empty() {
        return Decimal::ZERO;
    }

    let decimals = decimals as usize;
    // Smaller than the finest fraction a Decimal holds.
    if decimals >= digits.len() + MAX_DIGITS {
        return Decimal::ZERO;
    }
    let (int_part, frac_part) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        let mut frac = "0".repeat(decimals - digits.len());
        frac.push_str(digits);
        ("0".to_string(), frac)
    };

    if int_part.len() > MAX_DIGITS {
        return Decimal::ZERO;
    }
    let frac_room = MAX_DIGITS - int_part.len();
    let frac_part = &frac_part[..frac_part.len().min(frac_room)];

    let text = if frac_part.is_empty() {
        int_part
    } else {
        format!("{}.{}", int_part, frac_part)
    };
    Decimal::from_str(&text)
        .map(|d| d.normalize())
        .unwrap_or(Decimal::ZERO)
}

/// Group an unsigned integer string with thousands separators.
fn group_thousands(int_part: &str) -> String {
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format with a fixed number of decimals and thousands separators.
pub fn format_grouped(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
    let text = format!("{:.*}", dp as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut out = String::new();
    if rounded.is_sign_negative() && !rounded.is_zero() {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Token amount with up to 4 decimals, trailing zeros removed.
pub fn format_token_amount(amount: Decimal) -> String {
    let text = format_grouped(amount, 4);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Optional token amount, `N/A` when missing.
pub fn format_supply_value(amount: Option<Decimal>) -> String {
    amount
        .map(format_token_amount)
        .unwrap_or_else(|| "N/A".to_string())
}

/// Dollar amount with cents, e.g. `$1,234.50`.
pub fn format_usd(value: Decimal) -> String {
    format!("${}", format_grouped(value, 2))
}

/// Unit price with precision depending on magnitude.
pub fn format_price(price: Decimal) -> String {
    format!("${}", format_unit_price(price))
}

/// Unit price without a currency symbol.
pub fn format_unit_price(price: Decimal) -> String {
    let abs = price.abs();
    let dp = if abs >= Decimal::ONE {
        4
    } else if abs >= Decimal::new(1, 2) {
        6
    } else {
        8
    };
    format_grouped(price, dp)
}

/// Large number with a K/M/B suffix.
pub fn format_compact(value: Decimal, dp: u32) -> String {
    let thousand = Decimal::from(1_000);
    let million = Decimal::from(1_000_000);
    let billion = Decimal::from(1_000_000_000);

    let (scaled, suffix) = if value >= billion {
        (value / billion, "B")
    } else if value >= million {
        (value / million, "M")
    } else if value >= thousand {
        (value / thousand, "K")
    } else {
        (value, "")
    };
    let rounded = scaled.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
    format!("{:.*}{}", dp as usize, rounded, suffix)
}

/// UTC timestamp for messages, `Unknown` when missing.
pub fn format_timestamp(timestamp: Option<&DateTime<Utc>>) -> String {
    match timestamp {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "Unknown".to_string(),
    }
}

/// Parse an upstream RFC 3339 timestamp (accepting a trailing `Z`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_normalize_token_amount() {
        assert_eq!(normalize_token_amount("1500000000000000000", 18), dec("1.5"));
        assert_eq!(normalize_token_amount("1", 18), dec("0.000000000000000001"));
        assert_eq!(normalize_token_amount("123456", 0), dec("123456"));
        assert_eq!(normalize_token_amount("", 18), Decimal::ZERO);
        assert_eq!(normalize_token_amount("12abc", 18), Decimal::ZERO);
        assert_eq!(normalize_token_amount("0000", 18), Decimal::ZERO);
    }

    #[test]
    fn test_normalize_token_amount_absurd_decimals() {
        assert_eq!(normalize_token_amount("1", u32::MAX), Decimal::ZERO);
        assert_eq!(normalize_token_amount("123", 31), Decimal::ZERO);
        assert_eq!(normalize_token_amount("5", 27), Decimal::new(5, 27));
    }

    #[test]
    fn test_normalize_token_amount_large_supply() {
        // 88 billion tokens at 18 decimals is 29 digits raw.
        let raw = format!("88{}", "0".repeat(27));
        assert_eq!(normalize_token_amount(&raw, 18), dec("88000000000"));

        let raw = format!("123456789012{}", "9".repeat(20));
        let amount = normalize_token_amount(&raw, 18);
        assert!(amount > dec("12345678901299"));
    }

    #[test]
    fn test_format_token_amount() {
        assert_eq!(format_token_amount(dec("1234567.5")), "1,234,567.5");
        assert_eq!(format_token_amount(dec("1000")), "1,000");
        assert_eq!(format_token_amount(dec("0.123456")), "0.1235");
        assert_eq!(format_token_amount(dec("0.00001")), "0");
    }

    #[test]
    fn test_format_usd_and_price() {
        assert_eq!(format_usd(dec("1234.5")), "$1,234.50");
        assert_eq!(format_usd(dec("50")), "$50.00");
        assert_eq!(format_price(dec("1.5")), "$1.5000");
        assert_eq!(format_price(dec("0.05")), "$0.050000");
        assert_eq!(format_price(dec("0.000123")), "$0.00012300");
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(dec("2500000"), 2), "2.50M");
        assert_eq!(format_compact(dec("1200"), 1), "1.2K");
        assert_eq!(format_compact(dec("999"), 2), "999.00");
        assert_eq!(format_compact(dec("3000000000"), 2), "3.00B");
    }

    #[test]
    fn test_timestamps() {
        let ts = parse_timestamp("2024-05-01T12:30:00.000000Z").unwrap();
        assert_eq!(format_timestamp(Some(&ts)), "2024-05-01 12:30:00 UTC");
        assert_eq!(format_timestamp(None), "Unknown");
        assert!(parse_timestamp("yesterday").is_none());
    }
}

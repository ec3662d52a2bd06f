//! Token price oracle.
//!
//! Fetches the latest OG88 quote over HTTP and keeps the last good quote for
//! a short TTL so bursts of commands do not hammer the endpoint.

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use og88_core::{parse_decimal, PriceQuote};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Source of the latest token price.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Latest quote. `Err` means the price is unavailable right now.
    async fn latest(&self) -> FeedResult<PriceQuote>;
}

/// Decimal from a JSON number or numeric string.
pub fn json_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Parse the oracle response body. Accepts a flat object or one wrapped in `data`.
pub fn parse_quote(body: &Value) -> FeedResult<PriceQuote> {
    let obj = match body.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => body,
    };
    if !obj.is_object() {
        return Err(FeedError::ParseError("price response is not an object".to_string()));
    }
    Ok(PriceQuote {
        price_usd: json_decimal(obj.get("price_usd")),
        price_wco: json_decimal(obj.get("price_wco")),
        market_cap: json_decimal(obj.get("market_cap")),
        last_updated: obj
            .get("last_updated")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// HTTP price oracle with a TTL cache.
pub struct HttpPriceOracle {
    url: String,
    http: reqwest::Client,
    cache_ttl: Duration,
    cache: RwLock<Option<(Instant, PriceQuote)>>,
}

impl HttpPriceOracle {
    pub fn new(url: impl Into<String>, cache_ttl: Duration, request_timeout: Duration) -> FeedResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            url: url.into(),
            http,
            cache_ttl,
            cache: RwLock::new(None),
        })
    }

    async fn fetch(&self) -> FeedResult<PriceQuote> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::from_status(response.status(), &self.url));
        }
        let body: Value = serde_json::from_str(&response.text().await?)?;
        parse_quote(&body)
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn latest(&self) -> FeedResult<PriceQuote> {
        if let Some((fetched_at, quote)) = self.cache.read().await.as_ref() {
            if fetched_at.elapsed() < self.cache_ttl {
                return Ok(quote.clone());
            }
        }

        match self.fetch().await {
            Ok(quote) => {
                debug!(price_usd = ?quote.price_usd, "Fetched token price");
                *self.cache.write().await = Some((Instant::now(), quote.clone()));
                Ok(quote)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch token price");
                Err(e)
            }
        }
    }
}

/// Settable price oracle for tests.
#[derive(Default)]
pub struct MockPriceOracle {
    quote: Mutex<Option<PriceQuote>>,
}

impl MockPriceOracle {
    pub fn new(quote: Option<PriceQuote>) -> Self {
        Self {
            quote: Mutex::new(quote),
        }
    }

    /// Oracle returning a fixed USD price.
    pub fn with_usd(price: Decimal) -> Self {
        Self::new(Some(PriceQuote::usd(price)))
    }

    /// Replace the quote; `None` makes the oracle unavailable.
    pub fn set(&self, quote: Option<PriceQuote>) {
        if let Ok(mut slot) = self.quote.lock() {
            *slot = quote;
        }
    }
}

#[async_trait]
impl PriceOracle for MockPriceOracle {
    async fn latest(&self) -> FeedResult<PriceQuote> {
        self.quote
            .lock()
            .ok()
            .and_then(|q| q.clone())
            .ok_or_else(|| FeedError::RequestFailed("Mock price unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_parse_quote_mixed_types() {
        let body = json!({
            "price_usd": "0.00042",
            "price_wco": 0.5,
            "market_cap": "n/a",
            "last_updated": "2024-05-01T12:00:00Z"
        });
        let quote = parse_quote(&body).unwrap();
        assert_eq!(quote.price_usd, Some(Decimal::from_str("0.00042").unwrap()));
        assert_eq!(quote.price_wco, Some(Decimal::from_str("0.5").unwrap()));
        assert_eq!(quote.market_cap, None);
        assert_eq!(quote.last_updated.as_deref(), Some("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn test_parse_quote_wrapped() {
        let body = json!({"data": {"price_usd": 2}});
        assert_eq!(parse_quote(&body).unwrap().price_usd, Some(Decimal::from(2)));
        assert!(parse_quote(&json!([1, 2])).is_err());
    }

    #[tokio::test]
    async fn test_mock_oracle() {
        let oracle = MockPriceOracle::with_usd(Decimal::ONE);
        assert!(oracle.latest().await.is_ok());
        oracle.set(None);
        assert!(oracle.latest().await.is_err());
    }

    #[tokio::test]
    async fn test_cached_quote_served_within_ttl() {
        let oracle = HttpPriceOracle::new(
            "http://127.0.0.1:9/price",
            Duration::from_secs(60),
            Duration::from_millis(200),
        )
        .unwrap();
        *oracle.cache.write().await = Some((Instant::now(), PriceQuote::usd(Decimal::TWO)));
        assert_eq!(oracle.latest().await.unwrap().price_usd, Some(Decimal::TWO));
    }
}

//! Blockscout v2 REST client.
//!
//! Serves token transfers for the monitors and token counters / balances
//! for chat commands.

use crate::error::{FeedError, FeedResult};
use crate::source::{merge_pages, EventQuery, EventSource};
use crate::stats::{ChainStats, SupplyOverview, TokenCounters};
use async_trait::async_trait;
use futures_util::future::join_all;
use og88_core::{
    normalize_token_amount, parse_timestamp, ChainEvent, EventClass, EventDetail,
    TransferDirection, DEFAULT_TOKEN_DECIMALS,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct BlockscoutConfig {
    /// API base, e.g. `https://scan.w-chain.com/api/v2`.
    pub base_url: String,
    /// Token contract address (lower-cased).
    pub token_address: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl BlockscoutConfig {
    pub fn new(base_url: impl Into<String>, token_address: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_address: token_address.into().to_lowercase(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Blockscout explorer client.
pub struct BlockscoutClient {
    config: BlockscoutConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TransferPage {
    #[serde(default)]
    items: Vec<TransferItem>,
}

#[derive(Debug, Deserialize)]
struct TransferItem {
    #[serde(default, alias = "tx_hash")]
    transaction_hash: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    from: Option<AddressRef>,
    #[serde(default)]
    to: Option<AddressRef>,
    #[serde(default)]
    total: Option<TransferTotal>,
    #[serde(default)]
    token: Option<TokenRef>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    block_number: Option<Value>,
    #[serde(default)]
    log_index: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AddressRef {
    #[serde(default)]
    hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransferTotal {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    decimals: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TokenRef {
    #[serde(default, alias = "address_hash")]
    address: Option<String>,
    #[serde(default)]
    decimals: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    total_supply: Option<String>,
    #[serde(default)]
    decimals: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TokenBalance {
    #[serde(default)]
    token: Option<TokenRef>,
    #[serde(default)]
    value: Option<String>,
}

/// Blockscout encodes many integers as strings.
fn value_as_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decimals_of(total: Option<&TransferTotal>, token: Option<&TokenRef>) -> u32 {
    value_as_u64(total.and_then(|t| t.decimals.as_ref()))
        .or_else(|| value_as_u64(token.and_then(|t| t.decimals.as_ref())))
        .and_then(|d| u32::try_from(d).ok())
        .unwrap_or(DEFAULT_TOKEN_DECIMALS)
}

impl TransferItem {
    fn is_token(&self, token_address: &str) -> bool {
        match self.token.as_ref().and_then(|t| t.address.as_deref()) {
            Some(address) => address.eq_ignore_ascii_case(token_address),
            None => true,
        }
    }

    fn into_event(self, class: EventClass) -> ChainEvent {
        let decimals = decimals_of(self.total.as_ref(), self.token.as_ref());
        let raw_value = self
            .total
            .as_ref()
            .and_then(|t| t.value.as_deref())
            .unwrap_or("0");
        let detail = match class {
            EventClass::Burn => EventDetail::Burn { decimals },
            EventClass::BigBuy => EventDetail::Buy {
                method: self.method.clone(),
            },
        };
        ChainEvent {
            id: self.transaction_hash.unwrap_or_default(),
            amount: normalize_token_amount(raw_value, decimals),
            from: self.from.and_then(|a| a.hash),
            to: self.to.and_then(|a| a.hash),
            timestamp: self.timestamp.as_deref().and_then(parse_timestamp),
            block_number: value_as_u64(self.block_number.as_ref()),
            log_index: value_as_u64(self.log_index.as_ref()),
            detail,
        }
    }
}

impl BlockscoutClient {
    pub fn new(config: BlockscoutConfig) -> FeedResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &BlockscoutConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> FeedResult<T> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::from_status(response.status(), url));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn transfers_url(&self, address: &str, direction: TransferDirection) -> String {
        let filter = match direction {
            TransferDirection::Incoming => "to",
            TransferDirection::Outgoing => "from",
        };
        format!(
            "{}/addresses/{}/token-transfers?type=ERC-20&filter={}&token={}",
            self.config.base_url, address, filter, self.config.token_address
        )
    }

    /// One address page, most recent first.
    async fn address_transfers(&self, address: &str, class: EventClass) -> FeedResult<Vec<ChainEvent>> {
        let url = self.transfers_url(address, class.direction());
        let page: TransferPage = self.get_json(&url).await?;
        let token = self.config.token_address.as_str();
        let events: Vec<ChainEvent> = page
            .items
            .into_iter()
            .filter(|item| item.is_token(token))
            .map(|item| item.into_event(class))
            .collect();
        debug!(address, class = %class, count = events.len(), "Fetched token transfers");
        Ok(events)
    }

    async fn burned_balance(&self, address: &str) -> FeedResult<Decimal> {
        let url = format!("{}/addresses/{}/token-balances", self.config.base_url, address);
        let balances: Vec<TokenBalance> = self.get_json(&url).await?;
        let token = self.config.token_address.as_str();
        let balance = balances
            .into_iter()
            .find(|b| {
                b.token
                    .as_ref()
                    .and_then(|t| t.address.as_deref())
                    .is_some_and(|a| a.eq_ignore_ascii_case(token))
            })
            .map(|b| {
                let decimals = decimals_of(None, b.token.as_ref());
                normalize_token_amount(b.value.as_deref().unwrap_or("0"), decimals)
            })
            .unwrap_or(Decimal::ZERO);
        Ok(balance)
    }
}

#[async_trait]
impl EventSource for BlockscoutClient {
    async fn recent_events(&self, query: &EventQuery) -> FeedResult<Vec<ChainEvent>> {
        if query.addresses.is_empty() {
            return Err(FeedError::Misconfigured(format!(
                "no addresses configured for {} events",
                query.class
            )));
        }

        let fetches = query
            .addresses
            .iter()
            .map(|address| self.address_transfers(address, query.class));
        let pages = join_all(fetches)
            .await
            .into_iter()
            .collect::<FeedResult<Vec<_>>>()?;

        Ok(merge_pages(query, pages))
    }
}

#[async_trait]
impl ChainStats for BlockscoutClient {
    async fn token_counters(&self) -> FeedResult<TokenCounters> {
        let url = format!(
            "{}/tokens/{}/counters",
            self.config.base_url, self.config.token_address
        );
        let body: Value = self.get_json(&url).await?;
        Ok(TokenCounters {
            holders: value_as_u64(body.get("token_holders_count")).unwrap_or(0),
            transfers: value_as_u64(body.get("transfers_count")).unwrap_or(0),
        })
    }

    async fn supply_overview(&self, burn_addresses: &BTreeSet<String>) -> FeedResult<SupplyOverview> {
        let url = format!("{}/tokens/{}", self.config.base_url, self.config.token_address);
        let info: TokenInfo = self.get_json(&url).await?;
        let decimals = value_as_u64(info.decimals.as_ref())
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(DEFAULT_TOKEN_DECIMALS);
        let raw_supply = info
            .total_supply
            .ok_or_else(|| FeedError::ParseError("token total_supply missing".to_string()))?;
        let total_supply = normalize_token_amount(&raw_supply, decimals);

        let balances = join_all(burn_addresses.iter().map(|a| self.burned_balance(a)))
            .await
            .into_iter()
            .collect::<FeedResult<Vec<_>>>()?;
        let burned = balances.into_iter().sum::<Decimal>();

        Ok(SupplyOverview::new(total_supply, burned))
    }
}

//! Token supply and holder lookups used by chat commands.

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Explorer counters for the token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounters {
    pub holders: u64,
    pub transfers: u64,
}

/// Supply snapshot in whole token units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyOverview {
    pub total_supply: Decimal,
    pub burned: Decimal,
    pub circulating: Decimal,
}

impl SupplyOverview {
    /// Build from total and burned; circulating never goes negative.
    pub fn new(total_supply: Decimal, burned: Decimal) -> Self {
        let circulating = (total_supply - burned).max(Decimal::ZERO);
        Self {
            total_supply,
            burned,
            circulating,
        }
    }
}

/// Read-only token statistics.
#[async_trait]
pub trait ChainStats: Send + Sync {
    /// Holder and transfer counters.
    async fn token_counters(&self) -> FeedResult<TokenCounters>;

    /// Total, burned and circulating supply. Burned is the token balance
    /// held by every address in `burn_addresses`.
    async fn supply_overview(&self, burn_addresses: &BTreeSet<String>) -> FeedResult<SupplyOverview>;
}

/// Fixed statistics for tests.
#[derive(Debug, Clone, Default)]
pub struct MockChainStats {
    pub counters: Option<TokenCounters>,
    pub supply: Option<SupplyOverview>,
}

#[async_trait]
impl ChainStats for MockChainStats {
    async fn token_counters(&self) -> FeedResult<TokenCounters> {
        self.counters
            .ok_or_else(|| FeedError::RequestFailed("Mock counters unavailable".to_string()))
    }

    async fn supply_overview(&self, _burn_addresses: &BTreeSet<String>) -> FeedResult<SupplyOverview> {
        self.supply
            .ok_or_else(|| FeedError::RequestFailed("Mock supply unavailable".to_string()))
    }
}

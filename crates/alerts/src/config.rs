//! Alert configuration types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Optional illustrative media for one alert class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMedia {
    /// Animation file expected on local disk.
    pub local_path: Option<PathBuf>,
    /// Remotely hosted animation URL.
    pub remote_url: Option<String>,
}

impl AlertMedia {
    pub fn new(local_path: Option<PathBuf>, remote_url: Option<String>) -> Self {
        Self {
            local_path,
            remote_url: remote_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// No media configured at all.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Static values the message templates need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContext {
    /// Token ticker shown in messages.
    pub token_symbol: String,
    /// Token contract address.
    pub contract_address: String,
    /// Block explorer root, used for transaction links.
    pub scan_base_url: String,
    /// Big-buy threshold in USD.
    pub buy_threshold_usd: Decimal,
    /// Burn destination, shown when subscribing.
    pub burn_address: String,
}

impl Default for MessageContext {
    fn default() -> Self {
        Self {
            token_symbol: "OG88".to_string(),
            contract_address: "0xD1841fC048b488d92fdF73624a2128D10A847E88".to_string(),
            scan_base_url: "https://scan.w-chain.com".to_string(),
            buy_threshold_usd: Decimal::from(50),
            burn_address: "0x000000000000000000000000000000000000dead".to_string(),
        }
    }
}

impl MessageContext {
    /// Explorer link for a transaction, or the explorer root without a hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        let base = self.scan_base_url.trim_end_matches('/');
        if tx_hash.is_empty() {
            base.to_string()
        } else {
            format!("{}/tx/{}", base, tx_hash)
        }
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bound on each individual delivery attempt.
    pub delivery_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_remote_url_is_unset() {
        let media = AlertMedia::new(None, Some("  ".to_string()));
        assert_eq!(media, AlertMedia::none());
    }

    #[test]
    fn test_tx_url() {
        let ctx = MessageContext {
            scan_base_url: "https://scan.example/".to_string(),
            ..Default::default()
        };
        assert_eq!(ctx.tx_url("0xabc"), "https://scan.example/tx/0xabc");
        assert_eq!(ctx.tx_url(""), "https://scan.example");
    }
}

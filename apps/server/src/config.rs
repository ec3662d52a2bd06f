//! Application configuration loaded from the environment.

use og88_alerts::{AlertMedia, MessageContext};
use og88_core::parse_decimal;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const DEFAULT_BLOCKSCOUT_API_BASE: &str = "https://scan.w-chain.com/api/v2";
const DEFAULT_SCAN_BASE_URL: &str = "https://scan.w-chain.com";
const DEFAULT_PRICE_API: &str = "https://og88-price-api-production.up.railway.app/price";
const DEFAULT_TOKEN_ADDRESS: &str = "0xD1841fC048b488d92fdF73624a2128D10A847E88";
const DEFAULT_BURN_ADDRESS: &str = "0x000000000000000000000000000000000000dead";
const DEFAULT_LIQUIDITY_ADDRESSES: &str = "0xc61856cdf226645eab487352c031ec4341993f87";
const DEFAULT_DATABASE_URL: &str = "sqlite:og88-bot.db";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
}

/// Media configuration for both alert classes.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSettings {
    pub burn: AlertMedia,
    pub buy: AlertMedia,
}

/// Polling and timeout settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub burn_poll_interval: Duration,
    pub buy_poll_interval: Duration,
    pub batch_size: usize,
    pub fetch_timeout: Duration,
    pub delivery_timeout: Duration,
    pub price_cache_ttl: Duration,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub telegram_token: String,
    pub blockscout_api_base: String,
    pub scan_base_url: String,
    pub price_api_url: String,
    /// Token contract as configured, for display.
    pub contract_address: String,
    /// Token contract (lower-cased).
    pub token_address: String,
    pub burn_address: String,
    /// Liquidity pools watched for buys. Empty disables buy monitoring.
    pub liquidity_addresses: Vec<String>,
    /// Big buy threshold in USD.
    pub buy_threshold_usd: Decimal,
    pub monitor: MonitorSettings,
    pub media: MediaSettings,
    pub database_url: String,
    /// Bamboo Bash WebApp launched by `/play`. Unset disables the game.
    pub webapp_url: Option<String>,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let burn_poll = seconds(&get, "BURN_MONITOR_POLL_SECONDS", 60);
        let buy_poll = seconds(&get, "OG88_BUY_MONITOR_POLL_SECONDS", burn_poll.as_secs());

        let media_path = |key: &str, default: &str| {
            Some(PathBuf::from(get(key).unwrap_or_else(|| default.to_string())))
        };

        let contract_address = get("OG88_TOKEN_ADDRESS").unwrap_or_else(|| DEFAULT_TOKEN_ADDRESS.to_string());

        Ok(Self {
            telegram_token,
            blockscout_api_base: get("BLOCKSCOUT_API_BASE")
                .unwrap_or_else(|| DEFAULT_BLOCKSCOUT_API_BASE.to_string()),
            scan_base_url: get("SCAN_BASE_URL").unwrap_or_else(|| DEFAULT_SCAN_BASE_URL.to_string()),
            price_api_url: get("OG88_PRICE_API").unwrap_or_else(|| DEFAULT_PRICE_API.to_string()),
            token_address: contract_address.to_lowercase(),
            contract_address,
            burn_address: get("BURN_WALLET_ADDRESS")
                .unwrap_or_else(|| DEFAULT_BURN_ADDRESS.to_string())
                .to_lowercase(),
            liquidity_addresses: parse_address_list(
                &lookup("OG88_LIQUIDITY_ADDRESSES").unwrap_or_else(|| DEFAULT_LIQUIDITY_ADDRESSES.to_string()),
            ),
            buy_threshold_usd: buy_threshold(&get),
            monitor: MonitorSettings {
                burn_poll_interval: burn_poll,
                buy_poll_interval: buy_poll,
                batch_size: number(&get, "MONITOR_BATCH_SIZE", 5).max(1) as usize,
                fetch_timeout: seconds(&get, "FETCH_TIMEOUT_SECONDS", 15),
                delivery_timeout: seconds(&get, "DELIVERY_TIMEOUT_SECONDS", 20),
                price_cache_ttl: seconds(&get, "PRICE_CACHE_TTL_SECONDS", 60),
            },
            media: MediaSettings {
                burn: AlertMedia::new(
                    media_path("BURN_ALERT_VIDEO_PATH", "Assets/burn.mp4"),
                    get("BURN_ALERT_ANIMATION_URL"),
                ),
                buy: AlertMedia::new(
                    media_path("BIG_BUY_ALERT_VIDEO_PATH", "Assets/buy.mp4"),
                    get("BIG_BUY_ALERT_ANIMATION_URL"),
                ),
            },
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            webapp_url: get("OG88_WEBAPP_URL"),
        })
    }

    /// Values the message templates need.
    pub fn message_context(&self) -> MessageContext {
        MessageContext {
            contract_address: self.contract_address.clone(),
            scan_base_url: self.scan_base_url.clone(),
            buy_threshold_usd: self.buy_threshold_usd,
            burn_address: self.burn_address.clone(),
            ..MessageContext::default()
        }
    }
}

/// Comma separated addresses, trimmed and lower-cased.
pub fn parse_address_list(raw: &str) -> Vec<String> {
    let mut addresses: Vec<String> = Vec::new();
    for address in raw.split(',').map(|a| a.trim().to_lowercase()) {
        if !address.is_empty() && !addresses.contains(&address) {
            addresses.push(address);
        }
    }
    addresses
}

fn number<G>(get: &G, key: &str, default: u64) -> u64
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default, "Invalid number, using default");
            default
        }),
        None => default,
    }
}

fn seconds<G>(get: &G, key: &str, default: u64) -> Duration
where
    G: Fn(&str) -> Option<String>,
{
    Duration::from_secs(number(get, key, default).max(1))
}

/// First parseable of the current and legacy threshold keys, else 50.
fn buy_threshold<G>(get: &G) -> Decimal
where
    G: Fn(&str) -> Option<String>,
{
    for key in ["OG88_BIG_BUY_THRESHOLD_USD", "OG88_BIG_BUY_THRESHOLD"] {
        if let Some(raw) = get(key) {
            match parse_decimal(&raw) {
                Some(value) if value > Decimal::ZERO => return value,
                _ => warn!(key, value = %raw, "Invalid buy threshold, ignoring"),
            }
        }
    }
    Decimal::from(50)
}

//! OG88 Bot - burn and big buy alerts for Telegram.

mod config;

use clap::Parser;
use config::AppConfig;
use og88_alerts::{
    AlertDispatcher, CommandHandler, Database, DispatcherConfig, Monitor, MonitorConfig, SubscriberRegistry,
    TelegramBot, TelegramChannel,
};
use og88_core::EventClass;
use og88_feeds::{BlockscoutClient, BlockscoutConfig, HttpPriceOracle};
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// OG88 Bot CLI
#[derive(Parser, Debug)]
#[command(name = "og88-bot")]
#[command(about = "OG88 burn and big buy alert bot", long_about = None)]
struct Args {
    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Subscriber database URL (overrides DATABASE_URL)
    #[arg(short, long)]
    database: Option<String>,

    /// Keep subscribers in memory only
    #[arg(long, default_value_t = false)]
    no_persist: bool,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Open the subscriber store, or run in memory when disabled or unreachable.
async fn open_database(args: &Args, config: &AppConfig) -> Option<Database> {
    if args.no_persist {
        info!("  Persistence: disabled");
        return None;
    }
    let url = args.database.as_deref().unwrap_or(&config.database_url);
    match Database::connect(url).await {
        Ok(db) => {
            info!("  Persistence: {}", url);
            Some(db)
        }
        Err(e) => {
            warn!("Failed to open subscriber database {}, keeping subscribers in memory: {}", url, e);
            None
        }
    }
}

async fn registry(class: EventClass, db: &Option<Database>) -> Arc<SubscriberRegistry> {
    let registry = match db {
        Some(db) => SubscriberRegistry::with_database(class, db.clone()).await,
        None => SubscriberRegistry::new(class),
    };
    Arc::new(registry)
}

fn monitor_config(
    class: EventClass,
    addresses: Vec<String>,
    poll_interval: Duration,
    config: &AppConfig,
) -> MonitorConfig {
    let mut monitor = MonitorConfig::new(class, addresses);
    monitor.poll_interval = poll_interval;
    monitor.batch_size = config.monitor.batch_size;
    monitor.fetch_timeout = config.monitor.fetch_timeout;
    monitor.threshold_usd = config.buy_threshold_usd;
    monitor
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return;
        }
    };

    info!("🐼 OG88 Bot starting...");
    info!("  Explorer API: {}", config.blockscout_api_base);
    info!("  Token: {}", config.token_address);
    info!("  Burn wallet: {}", config.burn_address);
    info!("  Liquidity pools: {}", config.liquidity_addresses.len());
    info!("  Big buy threshold: ${}", config.buy_threshold_usd);
    info!("  WebApp: {}", config.webapp_url.as_deref().unwrap_or("not configured"));
    info!(
        "  Poll intervals: burn {}s, buys {}s",
        config.monitor.burn_poll_interval.as_secs(),
        config.monitor.buy_poll_interval.as_secs()
    );

    let mut explorer_config = BlockscoutConfig::new(&config.blockscout_api_base, &config.token_address);
    explorer_config.request_timeout = config.monitor.fetch_timeout;
    let explorer = match BlockscoutClient::new(explorer_config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create explorer client: {}", e);
            return;
        }
    };
    let oracle = match HttpPriceOracle::new(
        &config.price_api_url,
        config.monitor.price_cache_ttl,
        config.monitor.fetch_timeout,
    ) {
        Ok(oracle) => Arc::new(oracle),
        Err(e) => {
            error!("Failed to create price oracle: {}", e);
            return;
        }
    };

    let db = open_database(&args, &config).await;
    let burn_subscribers = registry(EventClass::Burn, &db).await;
    let buy_subscribers = registry(EventClass::BigBuy, &db).await;

    let bot = Bot::new(&config.telegram_token);
    let context = config.message_context();
    let dispatcher = Arc::new(
        AlertDispatcher::new(
            Arc::new(TelegramChannel::new(bot.clone())),
            oracle.clone(),
            context.clone(),
            DispatcherConfig {
                delivery_timeout: config.monitor.delivery_timeout,
            },
        )
        .with_media(EventClass::Burn, config.media.burn.clone())
        .with_media(EventClass::BigBuy, config.media.buy.clone()),
    );

    let burns = Arc::new(Monitor::new(
        monitor_config(
            EventClass::Burn,
            vec![config.burn_address.clone()],
            config.monitor.burn_poll_interval,
            &config,
        ),
        explorer.clone(),
        oracle.clone(),
        dispatcher.clone(),
        burn_subscribers,
    ));
    let buys = Arc::new(Monitor::new(
        monitor_config(
            EventClass::BigBuy,
            config.liquidity_addresses.clone(),
            config.monitor.buy_poll_interval,
            &config,
        ),
        explorer.clone(),
        oracle.clone(),
        dispatcher,
        buy_subscribers,
    ));

    let monitor_handles = vec![
        tokio::spawn(Arc::clone(&burns).run()),
        tokio::spawn(Arc::clone(&buys).run()),
    ];

    let commands = CommandHandler::new(context, oracle, explorer, burns, buys).with_webapp(config.webapp_url.clone());
    let telegram = Arc::new(TelegramBot::new(bot, commands));

    // Runs until Ctrl+C
    info!("Press Ctrl+C to stop...");
    telegram.run().await;

    warn!("Shutdown signal received");
    for handle in monitor_handles {
        handle.abort();
    }

    info!("👋 OG88 Bot stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["og88-bot"]);
        assert_eq!(args.log_level, "info");
        assert_eq!(args.database, None);
        assert!(!args.no_persist);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from(["og88-bot", "-l", "debug", "--database", "sqlite::memory:", "--no-persist"]);
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.database.as_deref(), Some("sqlite::memory:"));
        assert!(args.no_persist);
    }

    #[tokio::test]
    async fn test_memory_database_restores_registry() {
        let config = AppConfig::from_lookup(|key| (key == "TELEGRAM_BOT_TOKEN").then(|| "t".to_string())).unwrap();
        let args = Args::parse_from(["og88-bot", "--database", "sqlite::memory:"]);

        let db = open_database(&args, &config).await;
        assert!(db.is_some());
        let burns = registry(EventClass::Burn, &db).await;
        burns.subscribe(42).await;
        let restored = registry(EventClass::Burn, &db).await;
        assert!(restored.is_subscribed(42));
    }

    #[test]
    fn test_monitor_config_uses_settings() {
        let config = AppConfig::from_lookup(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some("t".to_string()),
            "MONITOR_BATCH_SIZE" => Some("8".to_string()),
            _ => None,
        })
        .unwrap();
        let monitor = monitor_config(
            EventClass::BigBuy,
            config.liquidity_addresses.clone(),
            Duration::from_secs(30),
            &config,
        );
        assert_eq!(monitor.batch_size, 8);
        assert_eq!(monitor.poll_interval, Duration::from_secs(30));
        assert_eq!(monitor.addresses.len(), 1);
    }
}

//! Chat command routing, independent of the Telegram transport.

use crate::config::MessageContext;
use crate::monitor::{Monitor, ScanError};
use crate::render;
use crate::webapp::{GameHistory, GameResult, Player, RECENT_GAMES_LIMIT};
use chrono::Utc;
use og88_core::EventClass;
use og88_feeds::{ChainStats, PriceOracle};
use std::sync::Arc;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::escape;
use tracing::{info, warn};

/// Number of events listed by `/buys latest`.
pub const LATEST_BUYS_LIMIT: usize = 3;

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Quick intro and command list")]
    Start,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Spot price in USD and WCO")]
    Price,
    #[command(description = "Total, burned and circulating supply")]
    Supply,
    #[command(description = "Holder count")]
    Holders,
    #[command(description = "Price, supply and holders together")]
    Info,
    #[command(description = "Contract address")]
    Ca,
    #[command(description = "Burn alerts. Usage: /burnwatch [off|status]")]
    Burnwatch(String),
    #[command(description = "Big buy alerts. Usage: /buys [off|status|latest]")]
    Buys(String),
    #[command(description = "Bamboo Bash WebApp. Usage: /play [recent]")]
    Play(String),
}

/// What a `/burnwatch` or `/buys` argument asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Subscribe,
    Unsubscribe,
    Status,
    Latest,
}

impl WatchAction {
    /// Parse the first argument. Anything unrecognised subscribes.
    pub fn parse(args: &str, allow_latest: bool) -> Self {
        let first = args
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        match first.as_str() {
            "off" | "stop" | "unsubscribe" => WatchAction::Unsubscribe,
            "status" => WatchAction::Status,
            "latest" | "recent" if allow_latest => WatchAction::Latest,
            _ => WatchAction::Subscribe,
        }
    }

    /// Whether the action changes the chat's subscriptions.
    pub fn changes_membership(self) -> bool {
        matches!(self, WatchAction::Subscribe | WatchAction::Unsubscribe)
    }
}

/// What a `/play` argument asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayAction {
    Launch,
    Recent,
}

impl PlayAction {
    pub fn parse(args: &str) -> Self {
        let first = args
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        match first.as_str() {
            "recent" | "scores" | "leaderboard" => PlayAction::Recent,
            _ => PlayAction::Launch,
        }
    }
}

/// Result of checking whether the sender may manage alerts in this chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
    /// Membership could not be looked up.
    Unverified,
}

/// Builds the reply for every command.
pub struct CommandHandler {
    context: MessageContext,
    oracle: Arc<dyn PriceOracle>,
    stats: Arc<dyn ChainStats>,
    burns: Arc<Monitor>,
    buys: Arc<Monitor>,
    webapp_url: Option<String>,
    games: Arc<GameHistory>,
}

impl CommandHandler {
    pub fn new(
        context: MessageContext,
        oracle: Arc<dyn PriceOracle>,
        stats: Arc<dyn ChainStats>,
        burns: Arc<Monitor>,
        buys: Arc<Monitor>,
    ) -> Self {
        Self {
            context,
            oracle,
            stats,
            burns,
            buys,
            webapp_url: None,
            games: Arc::new(GameHistory::new()),
        }
    }

    /// Enable `/play`. A blank URL leaves it disabled.
    pub fn with_webapp(mut self, url: Option<String>) -> Self {
        self.webapp_url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        self
    }

    pub fn games(&self) -> &Arc<GameHistory> {
        &self.games
    }

    /// WebApp to attach as a launch button to the reply for `command`.
    pub fn webapp_button(&self, command: &Command) -> Option<&str> {
        let url = self.webapp_url.as_deref()?;
        match command {
            Command::Start => Some(url),
            Command::Play(args) if PlayAction::parse(args) == PlayAction::Launch => Some(url),
            _ => None,
        }
    }

    /// Store a WebApp submission and build the acknowledgement.
    pub fn record_game(&self, player: Player, raw: &str) -> String {
        let result = GameResult::from_payload(player, raw, Utc::now());
        info!(
            user_id = ?result.player.user_id,
            score = result.score.as_deref().unwrap_or(""),
            "WebApp submission recorded"
        );
        let reply = render::game_recorded(&self.context, &result);
        self.games.record(result);
        reply
    }

    /// Whether the caller must check admin rights before `respond`.
    pub fn requires_admin(&self, command: &Command) -> bool {
        match command {
            Command::Burnwatch(args) => WatchAction::parse(args, false).changes_membership(),
            Command::Buys(args) => {
                self.buys.is_configured() && WatchAction::parse(args, true).changes_membership()
            }
            _ => false,
        }
    }

    /// HTML reply for `command` sent from `chat_id`.
    pub async fn respond(&self, chat_id: i64, command: Command, access: Access) -> String {
        match command {
            Command::Start => render::welcome(&self.context),
            Command::Help => render::help(&self.context),
            Command::Price => self.price().await,
            Command::Supply => self.supply().await,
            Command::Holders => self.holders().await,
            Command::Info => self.info().await,
            Command::Ca => render::contract_report(&self.context),
            Command::Burnwatch(args) => {
                self.burnwatch(chat_id, WatchAction::parse(&args, false), access)
                    .await
            }
            Command::Buys(args) => self.buys(chat_id, WatchAction::parse(&args, true), access).await,
            Command::Play(args) => self.play(PlayAction::parse(&args)),
        }
    }

    fn play(&self, action: PlayAction) -> String {
        if self.webapp_url.is_none() {
            return render::webapp_not_configured(&self.context);
        }
        match action {
            PlayAction::Recent => render::recent_games(&self.context, &self.games.recent(RECENT_GAMES_LIMIT)),
            PlayAction::Launch => render::play_launch(&self.context),
        }
    }

    async fn price(&self) -> String {
        match self.oracle.latest().await {
            Ok(quote) => render::price_report(&self.context, &quote),
            Err(e) => {
                warn!(error = %e, "Price lookup failed");
                "❌ Unable to fetch price data. Please try again later.".to_string()
            }
        }
    }

    async fn supply(&self) -> String {
        match self.stats.supply_overview(&self.burns.config().addresses).await {
            Ok(supply) => render::supply_report(&self.context, &supply),
            Err(e) => {
                warn!(error = %e, "Supply lookup failed");
                "❌ Unable to fetch supply data. Please try again later.".to_string()
            }
        }
    }

    async fn holders(&self) -> String {
        match self.stats.token_counters().await {
            Ok(counters) => render::holders_report(&self.context, &counters),
            Err(e) => {
                warn!(error = %e, "Counter lookup failed");
                "❌ Unable to fetch holder data. Please try again later.".to_string()
            }
        }
    }

    async fn info(&self) -> String {
        let burn_addresses = &self.burns.config().addresses;
        let (quote, supply, counters) = tokio::join!(
            self.oracle.latest(),
            self.stats.supply_overview(burn_addresses),
            self.stats.token_counters(),
        );
        render::info_report(
            &self.context,
            quote.ok().as_ref(),
            supply.ok().as_ref(),
            counters.ok().as_ref(),
        )
    }

    fn access_denied(access: Access, what: &str) -> Option<String> {
        match access {
            Access::Granted => None,
            Access::Denied => Some(format!("❌ Only channel admins can {}.", what)),
            Access::Unverified => {
                Some("⚠️ I couldn't verify your admin status. Please try again.".to_string())
            }
        }
    }

    async fn burnwatch(&self, chat_id: i64, action: WatchAction, access: Access) -> String {
        let subscribers = self.burns.subscribers();
        if action.changes_membership() {
            if let Some(reply) = Self::access_denied(access, "enable or disable burn alerts") {
                return reply;
            }
        }

        match action {
            WatchAction::Unsubscribe => {
                if subscribers.unsubscribe(chat_id).await {
                    info!(class = %EventClass::Burn, chat_id, "Chat unsubscribed");
                    "🛑 Burn alerts disabled for this chat.".to_string()
                } else {
                    "ℹ️ Burn alerts are already disabled here.".to_string()
                }
            }
            WatchAction::Status => format!(
                "📊 Burn alert status: {}. Total subscribers: {}.",
                status_word(subscribers.is_subscribed(chat_id)),
                subscribers.count()
            ),
            WatchAction::Subscribe | WatchAction::Latest => {
                if !subscribers.subscribe(chat_id).await {
                    return "✅ Burn alerts already enabled for this chat.".to_string();
                }
                info!(class = %EventClass::Burn, chat_id, "Chat subscribed");
                self.burns.prime().await;
                format!(
                    "🔥 Burn alerts enabled! You'll be notified whenever {} tokens reach the burn wallet <code>{}</code>.",
                    escape(&self.context.token_symbol),
                    escape(&self.context.burn_address)
                )
            }
        }
    }

    async fn buys(&self, chat_id: i64, action: WatchAction, access: Access) -> String {
        if !self.buys.is_configured() {
            return "⚠️ Big buy alerts require OG88 liquidity pool addresses. \
                    Please set OG88_LIQUIDITY_ADDRESSES in your environment."
                .to_string();
        }
        let subscribers = self.buys.subscribers();
        if action.changes_membership() {
            if let Some(reply) = Self::access_denied(access, "enable or disable big buy alerts") {
                return reply;
            }
        }

        match action {
            WatchAction::Unsubscribe => {
                if subscribers.unsubscribe(chat_id).await {
                    info!(class = %EventClass::BigBuy, chat_id, "Chat unsubscribed");
                    "🛑 Big buy alerts disabled for this chat.".to_string()
                } else {
                    "ℹ️ Big buy alerts are already disabled here.".to_string()
                }
            }
            WatchAction::Status => {
                let summary = self.threshold_summary().await;
                format!(
                    "📊 Big buy alerts are {}. Threshold: {}. Total subscribers: {}.",
                    status_word(subscribers.is_subscribed(chat_id)),
                    summary,
                    subscribers.count()
                )
            }
            WatchAction::Latest => self.latest_buys().await,
            WatchAction::Subscribe => {
                let summary = self.threshold_summary().await;
                if !subscribers.subscribe(chat_id).await {
                    return format!("✅ Big buy alerts already enabled for buys above {}.", summary);
                }
                info!(class = %EventClass::BigBuy, chat_id, "Chat subscribed");
                self.buys.prime().await;
                format!(
                    "🐼 Panda scouts activated! You'll be pinged whenever buys exceed {}.",
                    summary
                )
            }
        }
    }

    async fn threshold_summary(&self) -> String {
        let threshold = self.buys.current_threshold().await.ok().flatten();
        render::threshold_summary(&self.context, threshold)
    }

    async fn latest_buys(&self) -> String {
        match self.buys.latest(LATEST_BUYS_LIMIT).await {
            Ok(events) if events.is_empty() => format!(
                "ℹ️ No {} buys above {} in the latest blocks.",
                escape(&self.context.token_symbol),
                self.threshold_summary().await
            ),
            Ok(events) => render::latest_buys(&self.context, &events),
            Err(ScanError::PriceUnavailable) => format!(
                "❌ Unable to convert the {} buy threshold into {} right now. Please try again shortly.",
                render::usd_threshold(&self.context),
                escape(&self.context.token_symbol)
            ),
            Err(e) => {
                warn!(error = %e, "Latest buys lookup failed");
                "❌ Unable to fetch recent buys. Please try again later.".to_string()
            }
        }
    }
}

fn status_word(subscribed: bool) -> &'static str {
    if subscribed {
        "subscribed"
    } else {
        "not subscribed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::delivery::RecordingChannel;
    use crate::dispatcher::AlertDispatcher;
    use crate::monitor::MonitorConfig;
    use crate::subscribers::SubscriberRegistry;
    use og88_core::ChainEvent;
    use og88_feeds::{FeedError, MockChainStats, MockEventSource, MockPriceOracle, SupplyOverview, TokenCounters};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    struct Fixture {
        handler: CommandHandler,
        burn_source: Arc<MockEventSource>,
        buy_source: Arc<MockEventSource>,
        oracle: Arc<MockPriceOracle>,
        burns: Arc<Monitor>,
        buys: Arc<Monitor>,
    }

    fn monitor(
        class: EventClass,
        addresses: Vec<String>,
        source: Arc<MockEventSource>,
        oracle: Arc<MockPriceOracle>,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Arc<Monitor> {
        Arc::new(Monitor::new(
            MonitorConfig::new(class, addresses),
            source,
            oracle,
            dispatcher,
            Arc::new(SubscriberRegistry::new(class)),
        ))
    }

    fn fixture_with(pools: Vec<String>, stats: MockChainStats) -> Fixture {
        let oracle = Arc::new(MockPriceOracle::with_usd(Decimal::new(1, 1)));
        let dispatcher = Arc::new(AlertDispatcher::new(
            Arc::new(RecordingChannel::new()),
            oracle.clone(),
            MessageContext::default(),
            DispatcherConfig::default(),
        ));
        let burn_source = Arc::new(MockEventSource::new());
        let buy_source = Arc::new(MockEventSource::new());
        let burns = monitor(
            EventClass::Burn,
            vec!["0x000000000000000000000000000000000000dead".into()],
            burn_source.clone(),
            oracle.clone(),
            dispatcher.clone(),
        );
        let buys = monitor(EventClass::BigBuy, pools, buy_source.clone(), oracle.clone(), dispatcher);
        let handler = CommandHandler::new(
            MessageContext::default(),
            oracle.clone(),
            Arc::new(stats),
            burns.clone(),
            buys.clone(),
        );
        Fixture {
            handler,
            burn_source,
            buy_source,
            oracle,
            burns,
            buys,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(vec!["0xpool".into()], MockChainStats::default())
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(
            Command::parse("/burnwatch off", "og88bot").unwrap(),
            Command::Burnwatch("off".to_string())
        );
        assert_eq!(Command::parse("/buys", "og88bot").unwrap(), Command::Buys(String::new()));
        assert_eq!(Command::parse("/ca", "og88bot").unwrap(), Command::Ca);
        assert_eq!(
            Command::parse("/play recent", "og88bot").unwrap(),
            Command::Play("recent".to_string())
        );
    }

    #[test]
    fn test_watch_action_parse() {
        assert_eq!(WatchAction::parse("", true), WatchAction::Subscribe);
        assert_eq!(WatchAction::parse("STOP", false), WatchAction::Unsubscribe);
        assert_eq!(WatchAction::parse("unsubscribe now", true), WatchAction::Unsubscribe);
        assert_eq!(WatchAction::parse(" status ", true), WatchAction::Status);
        assert_eq!(WatchAction::parse("recent", true), WatchAction::Latest);
        assert_eq!(WatchAction::parse("latest", false), WatchAction::Subscribe);
    }

    #[test]
    fn test_requires_admin() {
        let f = fixture();
        assert!(f.handler.requires_admin(&Command::Burnwatch(String::new())));
        assert!(f.handler.requires_admin(&Command::Buys("off".into())));
        assert!(!f.handler.requires_admin(&Command::Buys("status".into())));
        assert!(!f.handler.requires_admin(&Command::Buys("latest".into())));
        assert!(!f.handler.requires_admin(&Command::Price));

        let unconfigured = fixture_with(Vec::new(), MockChainStats::default());
        assert!(!unconfigured.handler.requires_admin(&Command::Buys(String::new())));
    }

    #[tokio::test]
    async fn test_burnwatch_subscribe_primes_cursor() {
        let f = fixture();
        f.burn_source.push_batch(vec![ChainEvent::burn("0xlast", Decimal::ONE)]);

        let reply = f
            .handler
            .respond(10, Command::Burnwatch(String::new()), Access::Granted)
            .await;

        assert!(reply.starts_with("🔥 Burn alerts enabled!"));
        assert!(f.burns.subscribers().is_subscribed(10));
        assert_eq!(f.burns.cursor().last_seen_id(), Some("0xlast"));

        let again = f
            .handler
            .respond(10, Command::Burnwatch(String::new()), Access::Granted)
            .await;
        assert_eq!(again, "✅ Burn alerts already enabled for this chat.");
        assert_eq!(f.burn_source.calls(), 1);
    }

    #[tokio::test]
    async fn test_burnwatch_access_denied() {
        let f = fixture();
        let denied = f
            .handler
            .respond(-100, Command::Burnwatch(String::new()), Access::Denied)
            .await;
        assert_eq!(denied, "❌ Only channel admins can enable or disable burn alerts.");

        let unverified = f
            .handler
            .respond(-100, Command::Burnwatch("off".into()), Access::Unverified)
            .await;
        assert!(unverified.contains("couldn't verify"));
        assert!(f.burns.subscribers().is_empty());
    }

    #[tokio::test]
    async fn test_burnwatch_status_and_off() {
        let f = fixture();
        f.burns.subscribers().subscribe(5).await;

        let status = f
            .handler
            .respond(5, Command::Burnwatch("status".into()), Access::Denied)
            .await;
        assert_eq!(status, "📊 Burn alert status: subscribed. Total subscribers: 1.");

        let off = f
            .handler
            .respond(5, Command::Burnwatch("off".into()), Access::Granted)
            .await;
        assert_eq!(off, "🛑 Burn alerts disabled for this chat.");
        let again = f
            .handler
            .respond(5, Command::Burnwatch("off".into()), Access::Granted)
            .await;
        assert_eq!(again, "ℹ️ Burn alerts are already disabled here.");
    }

    #[tokio::test]
    async fn test_buys_without_pools() {
        let f = fixture_with(Vec::new(), MockChainStats::default());
        let reply = f.handler.respond(1, Command::Buys(String::new()), Access::Granted).await;
        assert!(reply.contains("OG88_LIQUIDITY_ADDRESSES"));
        assert!(f.buys.subscribers().is_empty());
    }

    #[tokio::test]
    async fn test_buys_subscribe_shows_threshold() {
        let f = fixture();
        let reply = f.handler.respond(1, Command::Buys(String::new()), Access::Granted).await;
        assert_eq!(
            reply,
            "🐼 Panda scouts activated! You'll be pinged whenever buys exceed $50.00 (~500 OG88)."
        );
        assert!(f.buys.subscribers().is_subscribed(1));
    }

    #[tokio::test]
    async fn test_buys_latest() {
        let f = fixture();
        f.buy_source.push_batch(vec![
            ChainEvent::buy("0xb2", Decimal::from(900)),
            ChainEvent::buy("0xb1", Decimal::from(100)),
        ]);

        let reply = f.handler.respond(1, Command::Buys("latest".into()), Access::Denied).await;

        assert!(reply.starts_with("🐋 <b>Latest Big Buys</b>"));
        assert!(reply.contains("900 OG88"));
        assert!(!reply.contains("0xb1"));
        assert!(!f.buys.cursor().is_armed());
    }

    #[tokio::test]
    async fn test_buys_latest_failures() {
        let f = fixture();
        f.buy_source.push_error(FeedError::RateLimitExceeded);
        let reply = f.handler.respond(1, Command::Buys("latest".into()), Access::Granted).await;
        assert_eq!(reply, "❌ Unable to fetch recent buys. Please try again later.");

        let empty = f.handler.respond(1, Command::Buys("recent".into()), Access::Granted).await;
        assert_eq!(empty, "ℹ️ No OG88 buys above $50.00 (~500 OG88) in the latest blocks.");

        f.oracle.set(None);
        let no_price = f.handler.respond(1, Command::Buys("latest".into()), Access::Granted).await;
        assert!(no_price.starts_with("❌ Unable to convert the $50.00 buy threshold"));
    }

    #[tokio::test]
    async fn test_data_commands() {
        let stats = MockChainStats {
            counters: Some(TokenCounters {
                holders: 1500,
                transfers: 42,
            }),
            supply: Some(SupplyOverview::new(Decimal::from(1_000_000), Decimal::from(250_000))),
        };
        let f = fixture_with(vec!["0xpool".into()], stats);

        let supply = f.handler.respond(1, Command::Supply, Access::Granted).await;
        assert!(supply.contains("Circulating: 750,000 OG88"));

        let holders = f.handler.respond(1, Command::Holders, Access::Granted).await;
        assert!(holders.contains("Total Holders: 1,500"));

        f.oracle.set(None);
        let price = f.handler.respond(1, Command::Price, Access::Granted).await;
        assert_eq!(price, "❌ Unable to fetch price data. Please try again later.");

        let info = f.handler.respond(1, Command::Info, Access::Granted).await;
        assert!(info.contains("Price: N/A"));
        assert!(info.contains("Holders: 1,500"));
    }

    #[test]
    fn test_play_action_parse() {
        assert_eq!(PlayAction::parse(""), PlayAction::Launch);
        assert_eq!(PlayAction::parse("Scores"), PlayAction::Recent);
        assert_eq!(PlayAction::parse(" leaderboard now"), PlayAction::Recent);
        assert_eq!(PlayAction::parse("again"), PlayAction::Launch);
    }

    #[tokio::test]
    async fn test_play_without_webapp() {
        let f = fixture();
        let reply = f.handler.respond(1, Command::Play(String::new()), Access::Granted).await;
        assert_eq!(
            reply,
            "⚠️ The OG88 WebApp URL is not configured. Set OG88_WEBAPP_URL in your environment."
        );
        assert_eq!(f.handler.webapp_button(&Command::Start), None);
        assert_eq!(f.handler.webapp_button(&Command::Play(String::new())), None);
    }

    #[tokio::test]
    async fn test_play_launch_and_recent() {
        let f = fixture();
        let handler = f.handler.with_webapp(Some(" https://game.example/bash ".into()));

        assert_eq!(
            handler.webapp_button(&Command::Play(String::new())),
            Some("https://game.example/bash")
        );
        assert_eq!(handler.webapp_button(&Command::Start), Some("https://game.example/bash"));
        assert_eq!(handler.webapp_button(&Command::Play("recent".into())), None);
        assert_eq!(handler.webapp_button(&Command::Price), None);

        let launch = handler.respond(1, Command::Play(String::new()), Access::Granted).await;
        assert!(launch.starts_with("🎮 <b>OG88 Bamboo Bash</b>"));

        let empty = handler.respond(1, Command::Play("recent".into()), Access::Granted).await;
        assert!(empty.starts_with("ℹ️ No OG88 Bamboo Bash sessions recorded yet."));

        let player = Player {
            user_id: Some(3),
            username: Some("po".into()),
            full_name: None,
        };
        let ack = handler.record_game(player, r#"{"highscore": 880}"#);
        assert!(ack.starts_with("🏁 Recorded po's score: <b>880</b>."));

        let board = handler.respond(1, Command::Play("leaderboard".into()), Access::Granted).await;
        assert!(board.contains("1. po: 880"));
        assert_eq!(handler.games().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_stats_report_failure() {
        let f = fixture();
        let supply = f.handler.respond(1, Command::Supply, Access::Granted).await;
        assert_eq!(supply, "❌ Unable to fetch supply data. Please try again later.");
    }
}

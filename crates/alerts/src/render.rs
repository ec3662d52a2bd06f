//! Message templates (Telegram HTML).

use crate::config::MessageContext;
use crate::webapp::GameResult;
use og88_core::{
    format_compact, format_price, format_supply_value, format_timestamp, format_token_amount,
    format_unit_price, format_usd, parse_timestamp, ChainEvent, PriceQuote,
};
use og88_feeds::{SupplyOverview, TokenCounters};
use rust_decimal::Decimal;
use teloxide::utils::html::escape;

const NA: &str = "N/A";

fn usd_value_display(quote: Option<&PriceQuote>, amount: Decimal) -> String {
    quote
        .and_then(|q| q.usd_value(amount))
        .map(format_usd)
        .unwrap_or_else(|| NA.to_string())
}

/// Burn alert body. Prices come from the quote at dispatch time.
pub fn burn_alert(ctx: &MessageContext, event: &ChainEvent, quote: Option<&PriceQuote>) -> String {
    let amount = format_token_amount(event.amount);
    let symbol = escape(&ctx.token_symbol);
    format!(
        "🚨🚨 <b>PANDA JUST ATE {amount} {symbol} AND SPIT OUT THE ASHES</b> 🔥🐼\n\
         {amount} {symbol} ({usd}) PERMANENTLY DELETED FOREVER\n\
         Supply just got even tighter while you were scrolling\n\
         Every burn = richer holders 😈\n\
         <a href=\"{url}\">View transaction</a>\n\
         #{symbol} #BurnPrinterGoBrrrrr",
        usd = usd_value_display(quote, event.amount),
        url = escape(&ctx.tx_url(&event.id)),
    )
}

/// Big buy alert body.
pub fn big_buy_alert(ctx: &MessageContext, event: &ChainEvent, quote: Option<&PriceQuote>) -> String {
    let symbol = escape(&ctx.token_symbol);
    let wco = quote
        .and_then(|q| q.wco_value(event.amount))
        .map(|v| format!("{} WCO", format_token_amount(v)))
        .unwrap_or_else(|| NA.to_string());
    let buyer = event.to.as_deref().unwrap_or("Unknown");

    format!(
        "🐼 <b>{symbol} BIG BUY ALERT!</b> 🐼\n\n\
         Wow! Someone just scooped up <b>{amount} {symbol}</b>!\n\n\
         💰 USD Value: {usd}\n\
         🪙 WCO Value: {wco}\n\n\
         Buyer: <code>{buyer}</code>\n\
         Method: {method}\n\
         ⏱️ Time: {time}\n\
         🔗 Tx: <a href=\"{url}\">View on W-Scan</a>\n\n\
         🎉 Stay tuned, {symbol} activity is heating up!",
        amount = format_token_amount(event.amount),
        usd = usd_value_display(quote, event.amount),
        buyer = escape(buyer),
        method = escape(event.method()),
        time = format_timestamp(event.timestamp.as_ref()),
        url = escape(&ctx.tx_url(&event.id)),
    )
}

/// Configured USD threshold, e.g. `$50.00`.
pub fn usd_threshold(ctx: &MessageContext) -> String {
    format_usd(ctx.buy_threshold_usd)
}

/// Threshold in USD and, when the price is known, in tokens.
pub fn threshold_summary(ctx: &MessageContext, token_threshold: Option<Decimal>) -> String {
    let usd = usd_threshold(ctx);
    match token_threshold {
        Some(amount) => format!(
            "{} (~{} {})",
            usd,
            format_token_amount(amount),
            escape(&ctx.token_symbol)
        ),
        None => format!(
            "{} (awaiting price feed for {} amount)",
            usd,
            escape(&ctx.token_symbol)
        ),
    }
}

/// One line block for the latest-buys listing.
pub fn buy_event_summary(ctx: &MessageContext, event: &ChainEvent) -> String {
    let buyer = event.to.as_deref().unwrap_or("Unknown");
    let mut summary = format!(
        "• <code>{}</code> scooped <b>{} {}</b>\n  🕒 {}\n",
        escape(buyer),
        format_token_amount(event.amount),
        escape(&ctx.token_symbol),
        format_timestamp(event.timestamp.as_ref()),
    );
    if event.has_valid_id() {
        summary.push_str(&format!(
            "  🔗 <a href=\"{}\">Transaction</a>\n",
            escape(&ctx.tx_url(&event.id))
        ));
    }
    summary
}

/// Listing for `/buys latest`.
pub fn latest_buys(ctx: &MessageContext, events: &[ChainEvent]) -> String {
    let body = events
        .iter()
        .map(|e| buy_event_summary(ctx, e))
        .collect::<Vec<_>>()
        .join("\n");
    format!("🐋 <b>Latest Big Buys</b>\n\n{}", body)
}

pub fn welcome(ctx: &MessageContext) -> String {
    let symbol = escape(&ctx.token_symbol);
    format!(
        "🐼 <b>{symbol} Meme Bot</b>\n\n\
         Welcome to the {symbol} panda command center.\n\n\
         <b>Commands</b>\n\
         /price - {symbol} spot price in USD + WCO\n\
         /supply - Current total vs burned supply\n\
         /holders - Wallet count pulled from W-Scan\n\
         /info - Everything at a glance\n\
         /burnwatch - Toggle burn alerts for the panda furnace\n\
         /buys - Subscribe to &gt;{threshold} buy alerts\n\
         /ca - {symbol} contract address\n\
         /play - Launch {symbol} Bamboo Bash WebApp\n\n\
         Use /price or /supply for the fastest status check. 🔥",
        threshold = usd_threshold(ctx),
    )
}

pub fn help(ctx: &MessageContext) -> String {
    let symbol = escape(&ctx.token_symbol);
    format!(
        "📖 <b>{symbol} Meme Bot Help</b>\n\n\
         <b>Core Commands</b>\n\
         /start - Quick intro and command list\n\
         /price - Spot price (USD + WCO) with timestamp\n\
         /supply - Total / burned / circulating snapshot\n\
         /holders - Total {symbol} holder count\n\
         /info - Price, supply and holders together\n\
         /burnwatch - Subscribe/unsubscribe from burn alerts\n\
         /buys - Subscribe/unsubscribe from big buy alerts (&gt;{threshold})\n\
         /ca - Quick access to the {symbol} contract\n\
         /play - Open the {symbol} Bamboo Bash WebApp inside Telegram\n\n\
         <b>Tips</b>\n\
         • Use <code>/buys status</code> or <code>/burnwatch status</code> to confirm subscriptions\n\
         • Use <code>/buys latest</code> to see the most recent big buys\n\
         • Use <code>/burnwatch off</code> or <code>/buys off</code> to stop alerts\n\
         • Use <code>/play recent</code> to review the last few recorded WebApp scores",
        threshold = usd_threshold(ctx),
    )
}

fn last_updated_display(quote: &PriceQuote) -> Option<String> {
    quote
        .last_updated
        .as_deref()
        .and_then(parse_timestamp)
        .map(|ts| format_timestamp(Some(&ts)))
}

pub fn price_report(ctx: &MessageContext, quote: &PriceQuote) -> String {
    let price = quote
        .usable_usd()
        .map(format_price)
        .unwrap_or_else(|| NA.to_string());
    let wco = quote
        .usable_wco()
        .map(|p| format!("{} WCO", format_unit_price(p)))
        .unwrap_or_else(|| NA.to_string());
    let cap = quote
        .market_cap
        .filter(|c| *c > Decimal::ZERO)
        .map(|c| format!("${}", format_compact(c, 2)))
        .unwrap_or_else(|| NA.to_string());

    let mut text = format!(
        "🚨 <b>{} JUST WOKE UP HUNGRY</b> 🐼🔥\n\
         💰 Price: {} | {}\n\
         💥 Market Cap: {}\n",
        escape(&ctx.token_symbol),
        price,
        wco,
        cap
    );
    match last_updated_display(quote) {
        Some(ts) => text.push_str(&format!("🕒 {}\n", ts)),
        None => text.push_str("🕒 Timestamp unavailable\n"),
    }
    text.push_str("Buyback burns + panda army loading…");
    text
}

pub fn supply_report(ctx: &MessageContext, supply: &SupplyOverview) -> String {
    let symbol = escape(&ctx.token_symbol);
    format!(
        "🐼 <b>{symbol} SUPPLY</b>\n\
         ✅ Circulating: {circulating} {symbol}\n\
         🔥 Burned: {burned} {symbol} sent to the furnace forever\n\
         📦 Total ever: {total} {symbol}\n\
         #{symbol} #PandaPrinter",
        circulating = format_token_amount(supply.circulating),
        burned = format_token_amount(supply.burned),
        total = format_token_amount(supply.total_supply),
    )
}

fn group_count(n: u64) -> String {
    og88_core::format_grouped(Decimal::from(n), 0)
}

pub fn holders_report(ctx: &MessageContext, counters: &TokenCounters) -> String {
    format!(
        "👥 <b>{} Holders</b>\n\n\
         Total Holders: {}\n\
         Transfers Recorded: {}\n\n\
         📊 <i>Source: W-Chain Explorer Counters</i>",
        escape(&ctx.token_symbol),
        group_count(counters.holders),
        group_count(counters.transfers),
    )
}

pub fn contract_report(ctx: &MessageContext) -> String {
    format!(
        "📜 <b>{} Contract Address</b>\n\n<code>{}</code>\n\n\
         Add it to your wallet or share with fellow pandas.",
        escape(&ctx.token_symbol),
        escape(&ctx.contract_address),
    )
}

/// Consolidated overview; any missing piece renders as `N/A`.
pub fn info_report(
    ctx: &MessageContext,
    quote: Option<&PriceQuote>,
    supply: Option<&SupplyOverview>,
    counters: Option<&TokenCounters>,
) -> String {
    let symbol = escape(&ctx.token_symbol);
    let price = quote
        .and_then(PriceQuote::usable_usd)
        .map(format_price)
        .unwrap_or_else(|| NA.to_string());
    let wco = quote
        .and_then(PriceQuote::usable_wco)
        .map(|p| format!("{} WCO", format_unit_price(p)))
        .unwrap_or_else(|| NA.to_string());
    let cap = quote
        .and_then(|q| q.market_cap)
        .filter(|c| *c > Decimal::ZERO)
        .map(|c| format!("${}", format_compact(c, 2)))
        .unwrap_or_else(|| NA.to_string());

    let mut text = format!(
        "🐼 <b>{symbol} Quick Info</b>\n\n\
         💰 Price: {price} | {wco}\n\
         🏦 Market Cap: {cap}\n\
         📦 Total Supply: {total} {symbol}\n\
         🔥 Burned: {burned} {symbol}\n\
         🚀 Circulating: {circulating} {symbol}\n\
         👥 Holders: {holders}\n\
         🔁 Transfers: {transfers}\n",
        total = format_supply_value(supply.map(|s| s.total_supply)),
        burned = format_supply_value(supply.map(|s| s.burned)),
        circulating = format_supply_value(supply.map(|s| s.circulating)),
        holders = counters
            .map(|c| group_count(c.holders))
            .unwrap_or_else(|| NA.to_string()),
        transfers = counters
            .map(|c| group_count(c.transfers))
            .unwrap_or_else(|| NA.to_string()),
    );
    if let Some(ts) = quote.and_then(last_updated_display) {
        text.push_str(&format!("🕒 Updated: {}\n", ts));
    }
    text.push_str(&format!(
        "📜 Contract: <code>{}</code>",
        escape(&ctx.contract_address)
    ));
    text
}

pub fn webapp_not_configured(ctx: &MessageContext) -> String {
    format!(
        "⚠️ The {} WebApp URL is not configured. Set OG88_WEBAPP_URL in your environment.",
        escape(&ctx.token_symbol)
    )
}

pub fn play_launch(ctx: &MessageContext) -> String {
    format!(
        "🎮 <b>{} Bamboo Bash</b>\n\n\
         Tap the button below to open the official mini-game directly inside Telegram. \
         Your session automatically includes Telegram user context so we can track scores \
         and organize tournaments later on.\n\n\
         Use <code>/play recent</code> anytime to see the latest submissions.",
        escape(&ctx.token_symbol)
    )
}

/// Leaderboard of the latest submissions, newest first.
pub fn recent_games(ctx: &MessageContext, results: &[GameResult]) -> String {
    let symbol = escape(&ctx.token_symbol);
    if results.is_empty() {
        return format!("ℹ️ No {symbol} Bamboo Bash sessions recorded yet. Launch the WebApp with /play.");
    }
    let rows = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. {}: {} ({})",
                i + 1,
                escape(&r.display_name),
                r.score.as_deref().map(escape).unwrap_or_else(|| "data received".to_string()),
                format_timestamp(Some(&r.recorded_at)),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("🏆 <b>Latest {symbol} Bamboo Bash submissions</b>\n\n{rows}\n\nSubmit a new run via /play.")
}

/// Reply to a WebApp submission.
pub fn game_recorded(ctx: &MessageContext, result: &GameResult) -> String {
    match result.score.as_deref() {
        Some(score) => format!(
            "🏁 Recorded {}'s score: <b>{}</b>.\nWe'll use this data to seed {} tournaments soon!",
            escape(&result.display_name),
            escape(score),
            escape(&ctx.token_symbol)
        ),
        None => format!(
            "✅ Received your {} Bamboo Bash data. Stay tuned for tournament brackets!",
            escape(&ctx.token_symbol)
        ),
    }
}

//! Alert fan-out with the media fallback chain.

use crate::config::{AlertMedia, DispatcherConfig, MessageContext};
use crate::delivery::{DeliveryChannel, DeliveryError, MediaKind, MediaRef};
use crate::render;
use crate::subscribers::SubscriberRegistry;
use futures_util::future::join_all;
use og88_core::{ChainEvent, EventClass, PriceQuote};
use og88_feeds::PriceOracle;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of delivering one alert to one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted on this step of the chain.
    Delivered(MediaKind),
    /// The chat blocked the bot; it should be dropped.
    Rejected(String),
    /// Every step failed with a recoverable error.
    Failed(String),
}

/// Per-dispatch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    /// Chats removed because they permanently rejected the bot.
    pub pruned: Vec<i64>,
}

/// Media steps usable right now, in priority order.
///
/// A configured local file that does not exist is left out with a warning.
pub async fn media_chain(media: &AlertMedia) -> Vec<MediaRef> {
    let mut chain = Vec::with_capacity(2);
    if let Some(path) = &media.local_path {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => chain.push(MediaRef::LocalFile(path.clone())),
            _ => warn!(path = %path.display(), "Alert media file not found, skipping"),
        }
    }
    if let Some(url) = &media.remote_url {
        chain.push(MediaRef::Url(url.clone()));
    }
    chain
}

/// Try each media step, then plain text, stopping at the first success.
///
/// Every attempt is bounded by `timeout`; a timeout counts as a transient
/// failure. A permanent rejection ends the chain immediately.
pub async fn deliver_with_fallback(
    channel: &dyn DeliveryChannel,
    chat_id: i64,
    text: &str,
    chain: &[MediaRef],
    timeout: Duration,
) -> DeliveryOutcome {
    let steps = chain.iter().map(Some).chain(std::iter::once(None));
    let mut last_error = String::new();

    for media in steps {
        let kind = MediaKind::of(media);
        let result = match tokio::time::timeout(timeout, channel.send(chat_id, text, media)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Transient(format!(
                "timed out after {}s",
                timeout.as_secs_f64()
            ))),
        };

        match result {
            Ok(()) => return DeliveryOutcome::Delivered(kind),
            Err(DeliveryError::PermanentReject(reason)) => return DeliveryOutcome::Rejected(reason),
            Err(DeliveryError::Transient(reason)) => {
                debug!(chat_id, step = ?kind, error = %reason, "Delivery step failed, falling back");
                last_error = reason;
            }
        }
    }

    DeliveryOutcome::Failed(last_error)
}

/// Renders alerts and fans them out to subscribers.
pub struct AlertDispatcher {
    channel: Arc<dyn DeliveryChannel>,
    oracle: Arc<dyn PriceOracle>,
    context: MessageContext,
    burn_media: AlertMedia,
    buy_media: AlertMedia,
    config: DispatcherConfig,
}

impl AlertDispatcher {
    pub fn new(
        channel: Arc<dyn DeliveryChannel>,
        oracle: Arc<dyn PriceOracle>,
        context: MessageContext,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            channel,
            oracle,
            context,
            burn_media: AlertMedia::none(),
            buy_media: AlertMedia::none(),
            config,
        }
    }

    /// Set the illustrative media for one class.
    pub fn with_media(mut self, class: EventClass, media: AlertMedia) -> Self {
        match class {
            EventClass::Burn => self.burn_media = media,
            EventClass::BigBuy => self.buy_media = media,
        }
        self
    }

    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    pub fn media(&self, class: EventClass) -> &AlertMedia {
        match class {
            EventClass::Burn => &self.burn_media,
            EventClass::BigBuy => &self.buy_media,
        }
    }

    /// Current quote, if the oracle has one.
    async fn quote(&self) -> Option<PriceQuote> {
        match self.oracle.latest().await {
            Ok(quote) => Some(quote),
            Err(e) => {
                debug!(error = %e, "Price unavailable at dispatch time");
                None
            }
        }
    }

    /// Alert body for an event, priced at call time.
    pub async fn render(&self, event: &ChainEvent) -> String {
        let quote = self.quote().await;
        match event.class() {
            EventClass::Burn => render::burn_alert(&self.context, event, quote.as_ref()),
            EventClass::BigBuy => render::big_buy_alert(&self.context, event, quote.as_ref()),
        }
    }

    /// Deliver one event to every current subscriber.
    ///
    /// Deliveries run concurrently and independently. Chats that permanently
    /// reject the bot are removed from `subscribers` before this returns.
    pub async fn dispatch(&self, event: &ChainEvent, subscribers: &SubscriberRegistry) -> DispatchReport {
        let chats = subscribers.snapshot();
        if chats.is_empty() {
            return DispatchReport::default();
        }

        let class = event.class();
        let text = self.render(event).await;
        let chain = media_chain(self.media(class)).await;
        let timeout = self.config.delivery_timeout;

        let deliveries = chats.iter().map(|&chat_id| {
            let text = text.as_str();
            let chain = chain.as_slice();
            async move {
                let outcome = deliver_with_fallback(self.channel.as_ref(), chat_id, text, chain, timeout).await;
                (chat_id, outcome)
            }
        });

        let mut report = DispatchReport::default();
        for (chat_id, outcome) in join_all(deliveries).await {
            match outcome {
                DeliveryOutcome::Delivered(kind) => {
                    debug!(class = %class, chat_id, via = ?kind, "Alert delivered");
                    report.delivered += 1;
                }
                DeliveryOutcome::Rejected(reason) => {
                    subscribers.unsubscribe(chat_id).await;
                    info!(class = %class, chat_id, reason = %reason, "Removed subscriber that blocked the bot");
                    report.pruned.push(chat_id);
                }
                DeliveryOutcome::Failed(reason) => {
                    warn!(class = %class, chat_id, tx = %event.id, error = %reason, "Alert delivery failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            class = %class,
            tx = %event.id,
            delivered = report.delivered,
            failed = report.failed,
            pruned = report.pruned.len(),
            "Alert dispatched"
        );
        report
    }
}

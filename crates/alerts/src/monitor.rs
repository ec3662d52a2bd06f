//! Periodic per-class monitor: fetch, diff against the cursor, dispatch.

use crate::dispatcher::AlertDispatcher;
use crate::subscribers::SubscriberRegistry;
use og88_core::{ChainEvent, Cursor, EventClass};
use og88_feeds::{EventQuery, EventSource, FeedError, PriceOracle};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Errors for on-demand queries made by command handlers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("Price unavailable, threshold cannot be computed")]
    PriceUnavailable,
    #[error("Event source failed: {0}")]
    Fetch(String),
    #[error("No addresses configured for {0} monitoring")]
    Misconfigured(EventClass),
}

/// Why a scan did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoSubscribers,
    Misconfigured,
    PriceUnavailable,
    FetchFailed,
}

/// What one scan did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Skipped(SkipReason),
    /// First page after start: cursor set, nothing sent.
    Armed { cursor: Option<String> },
    Completed {
        dispatched: Vec<String>,
        window_exceeded: bool,
    },
}

/// Static settings of one monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub class: EventClass,
    /// Burn destinations or liquidity pools, depending on the class.
    pub addresses: BTreeSet<String>,
    pub poll_interval: Duration,
    /// Page size for each fetch.
    pub batch_size: usize,
    pub fetch_timeout: Duration,
    /// Fiat threshold; only used by classes that filter on amount.
    pub threshold_usd: Decimal,
    /// Delay before the first scan.
    pub initial_delay: Duration,
}

impl MonitorConfig {
    pub fn new(class: EventClass, addresses: impl IntoIterator<Item = String>) -> Self {
        Self {
            class,
            addresses: addresses
                .into_iter()
                .map(|a| a.trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
            poll_interval: Duration::from_secs(60),
            batch_size: 5,
            fetch_timeout: Duration::from_secs(15),
            threshold_usd: Decimal::from(50),
            initial_delay: Duration::from_secs(10),
        }
    }
}

/// One event class: its cursor, subscribers and polling task.
pub struct Monitor {
    config: MonitorConfig,
    source: Arc<dyn EventSource>,
    oracle: Arc<dyn PriceOracle>,
    dispatcher: Arc<AlertDispatcher>,
    subscribers: Arc<SubscriberRegistry>,
    cursor: Mutex<Cursor>,
    /// Held for the whole of a scan or prime so the two never interleave.
    scan_guard: tokio::sync::Mutex<()>,
    misconfig_reported: AtomicBool,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn EventSource>,
        oracle: Arc<dyn PriceOracle>,
        dispatcher: Arc<AlertDispatcher>,
        subscribers: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            config,
            source,
            oracle,
            dispatcher,
            subscribers,
            cursor: Mutex::new(Cursor::new()),
            scan_guard: tokio::sync::Mutex::new(()),
            misconfig_reported: AtomicBool::new(false),
        }
    }

    pub fn class(&self) -> EventClass {
        self.config.class
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        &self.subscribers
    }

    /// Copy of the current cursor.
    pub fn cursor(&self) -> Cursor {
        self.lock_cursor().clone()
    }

    /// Whether this monitor has anything to watch.
    pub fn is_configured(&self) -> bool {
        !self.config.addresses.is_empty()
    }

    fn lock_cursor(&self) -> std::sync::MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report a missing address set once per monitor.
    fn report_misconfigured(&self) {
        if !self.misconfig_reported.swap(true, Ordering::Relaxed) {
            warn!(class = %self.class(), "No addresses configured, monitoring disabled");
        }
    }

    /// Live amount threshold in token units.
    /// Classes that do not filter on amount have none.
    pub async fn current_threshold(&self) -> Result<Option<Decimal>, ScanError> {
        if !self.class().uses_threshold() {
            return Ok(None);
        }
        let quote = self
            .oracle
            .latest()
            .await
            .map_err(|_| ScanError::PriceUnavailable)?;
        quote
            .token_threshold(self.config.threshold_usd)
            .map(Some)
            .map_err(|_| ScanError::PriceUnavailable)
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<ChainEvent>, ScanError> {
        let threshold = self.current_threshold().await?;
        let mut query = EventQuery::new(self.class(), self.config.addresses.iter().cloned(), limit);
        if let Some(min) = threshold {
            query = query.with_min_amount(min);
        }

        match tokio::time::timeout(self.config.fetch_timeout, self.source.recent_events(&query)).await {
            Ok(Ok(events)) => Ok(events),
            Ok(Err(e)) => Err(ScanError::Fetch(e.to_string())),
            Err(_) => Err(ScanError::Fetch(
                FeedError::Timeout(format!("no response within {:?}", self.config.fetch_timeout)).to_string(),
            )),
        }
    }

    /// Run one scan.
    pub async fn scan(&self) -> ScanOutcome {
        let class = self.class();
        if !self.is_configured() {
            self.report_misconfigured();
            return ScanOutcome::Skipped(SkipReason::Misconfigured);
        }
        if self.subscribers.is_empty() {
            debug!(class = %class, "No subscribers, skipping scan");
            return ScanOutcome::Skipped(SkipReason::NoSubscribers);
        }

        let _guard = self.scan_guard.lock().await;

        let events = match self.fetch(self.config.batch_size).await {
            Ok(events) => events,
            Err(ScanError::PriceUnavailable) => {
                warn!(class = %class, "Price unavailable, skipping scan");
                return ScanOutcome::Skipped(SkipReason::PriceUnavailable);
            }
            Err(e) => {
                warn!(class = %class, error = %e, "Fetch failed, will retry next tick");
                return ScanOutcome::Skipped(SkipReason::FetchFailed);
            }
        };

        let (outcome, cursor) = {
            let mut cursor = self.lock_cursor();
            let previous = cursor.last_seen_id().map(str::to_string);
            let outcome = cursor.diff(&events);
            if outcome.window_exceeded {
                warn!(
                    class = %class,
                    stale_cursor = previous.as_deref().unwrap_or(""),
                    batch = events.len(),
                    "Cursor not in page, treating whole page as new"
                );
            }
            (outcome, cursor.last_seen_id().map(str::to_string))
        };

        if outcome.armed {
            info!(class = %class, cursor = cursor.as_deref().unwrap_or(""), "Cursor armed");
            return ScanOutcome::Armed { cursor };
        }

        let malformed = outcome.new_events.iter().filter(|e| !e.has_valid_id()).count();
        if malformed > 0 {
            warn!(
                class = %class,
                malformed,
                cursor = cursor.as_deref().unwrap_or(""),
                "Event without id treated as new, malformed id re-emitted every scan until it leaves the page"
            );
        }

        let mut dispatched = Vec::with_capacity(outcome.new_events.len());
        for event in &outcome.new_events {
            self.dispatcher.dispatch(event, &self.subscribers).await;
            dispatched.push(event.id.clone());
        }

        ScanOutcome::Completed {
            dispatched,
            window_exceeded: outcome.window_exceeded,
        }
    }

    /// Arm an uninitialized cursor from the newest event, without alerting.
    ///
    /// Skipped when a scan is in progress or the cursor is already armed.
    /// Returns whether the cursor was armed by this call.
    pub async fn prime(&self) -> bool {
        if !self.is_configured() || self.lock_cursor().is_armed() {
            return false;
        }
        let Ok(_guard) = self.scan_guard.try_lock() else {
            debug!(class = %self.class(), "Scan in progress, not priming");
            return false;
        };

        match self.fetch(1).await {
            Ok(events) => {
                let armed = self.lock_cursor().arm(&events);
                if armed {
                    info!(class = %self.class(), "Cursor primed on subscribe");
                }
                armed
            }
            Err(e) => {
                debug!(class = %self.class(), error = %e, "Prime skipped");
                false
            }
        }
    }

    /// Most recent events above the live threshold. Not cached and never
    /// touches the cursor.
    pub async fn latest(&self, limit: usize) -> Result<Vec<ChainEvent>, ScanError> {
        if !self.is_configured() {
            return Err(ScanError::Misconfigured(self.class()));
        }
        self.fetch(limit).await
    }

    /// Poll forever on the configured interval.
    /// Returns immediately when there is nothing to watch.
    pub async fn run(self: Arc<Self>) {
        if !self.is_configured() {
            self.report_misconfigured();
            return;
        }

        info!(
            class = %self.class(),
            addresses = self.config.addresses.len(),
            interval_secs = self.config.poll_interval.as_secs(),
            "Monitor started"
        );
        tokio::time::sleep(self.config.initial_delay).await;

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let outcome = self.scan().await;
            debug!(class = %self.class(), outcome = ?outcome, "Scan finished");
        }
    }
}

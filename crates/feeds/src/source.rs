//! Event source abstraction.

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use og88_core::{ChainEvent, EventClass};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Filter for a recent-events query.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    /// Event class; decides which side of the transfer is matched.
    pub class: EventClass,
    /// Watched addresses (lower-cased).
    pub addresses: BTreeSet<String>,
    /// Inclusive minimum amount in token units.
    pub min_amount: Option<Decimal>,
    /// Maximum number of events returned.
    pub limit: usize,
}

impl EventQuery {
    pub fn new(class: EventClass, addresses: impl IntoIterator<Item = String>, limit: usize) -> Self {
        Self {
            class,
            addresses: addresses.into_iter().map(|a| a.to_lowercase()).collect(),
            min_amount: None,
            limit,
        }
    }

    /// Set the inclusive minimum amount.
    pub fn with_min_amount(mut self, min_amount: Decimal) -> Self {
        self.min_amount = Some(min_amount);
        self
    }

    /// Whether an event passes the amount filter. `amount >= min` is big.
    #[inline]
    pub fn accepts(&self, event: &ChainEvent) -> bool {
        self.min_amount.map_or(true, |min| event.amount >= min)
    }
}

/// Read-only source of recent on-chain events.
///
/// Implementations return the most recent matching events, most recent
/// first. An `Err` is a fetch failure and must be distinguishable from an
/// empty `Ok`.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn recent_events(&self, query: &EventQuery) -> FeedResult<Vec<ChainEvent>>;
}

/// Merge per-address pages into one most-recent-first page.
/// Applies the amount filter, drops repeated identifiers and truncates to the limit.
pub fn merge_pages(query: &EventQuery, pages: Vec<Vec<ChainEvent>>) -> Vec<ChainEvent> {
    let single = pages.len() == 1;
    let mut events: Vec<ChainEvent> = pages
        .into_iter()
        .flatten()
        .filter(|e| query.accepts(e))
        .collect();

    // A single page is already in feed order; only merged pages are re-sorted.
    if !single {
        events.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
    }

    let mut seen = HashSet::new();
    events.retain(|e| !e.has_valid_id() || seen.insert(e.id.clone()));
    events.truncate(query.limit);
    events
}

/// Scripted event source for tests.
#[derive(Default)]
pub struct MockEventSource {
    responses: Mutex<VecDeque<FeedResult<Vec<ChainEvent>>>>,
    queries: Mutex<Vec<EventQuery>>,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page, most recent first.
    pub fn push_batch(&self, batch: Vec<ChainEvent>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Ok(batch));
        }
    }

    /// Queue a fetch failure.
    pub fn push_error(&self, error: FeedError) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(error));
        }
    }

    /// Hold every following query for `delay` before answering.
    /// A query dropped while waiting leaves its queued response in place.
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut current) = self.delay.lock() {
            *current = delay;
        }
    }

    /// Number of queries served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<EventQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn recent_events(&self, query: &EventQuery) -> FeedResult<Vec<ChainEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());
        match next {
            Some(Ok(batch)) => Ok(merge_pages(query, vec![batch])),
            Some(Err(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}

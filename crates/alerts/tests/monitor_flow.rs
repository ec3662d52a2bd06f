//! End-to-end monitor behaviour over scripted pages.

use og88_alerts::{
    AlertDispatcher, AlertMedia, DeliveryError, DispatcherConfig, MediaKind, MediaRef, MessageContext, Monitor,
    MonitorConfig, RecordingChannel, ScanOutcome, SkipReason, SubscriberRegistry,
};
use og88_core::{ChainEvent, EventClass};
use og88_feeds::{MockEventSource, MockPriceOracle};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

struct Setup {
    monitor: Arc<Monitor>,
    source: Arc<MockEventSource>,
    channel: Arc<RecordingChannel>,
}

fn setup_with(channel: RecordingChannel, media: AlertMedia) -> Setup {
    let source = Arc::new(MockEventSource::new());
    let oracle = Arc::new(MockPriceOracle::with_usd(Decimal::ONE));
    let channel = Arc::new(channel);
    let dispatcher = AlertDispatcher::new(
        channel.clone(),
        oracle.clone(),
        MessageContext::default(),
        DispatcherConfig {
            delivery_timeout: Duration::from_secs(1),
        },
    )
    .with_media(EventClass::Burn, media);

    let mut config = MonitorConfig::new(
        EventClass::Burn,
        vec!["0x000000000000000000000000000000000000dEaD".to_string()],
    );
    config.initial_delay = Duration::ZERO;
    config.batch_size = 10;

    let monitor = Arc::new(Monitor::new(
        config,
        source.clone(),
        oracle,
        Arc::new(dispatcher),
        Arc::new(SubscriberRegistry::new(EventClass::Burn)),
    ));
    Setup {
        monitor,
        source,
        channel,
    }
}

fn setup() -> Setup {
    setup_with(RecordingChannel::new(), AlertMedia::none())
}

fn page(ids: &[&str]) -> Vec<ChainEvent> {
    ids.iter().map(|id| ChainEvent::burn(*id, Decimal::from(10))).collect()
}

fn completed(ids: &[&str], window_exceeded: bool) -> ScanOutcome {
    ScanOutcome::Completed {
        dispatched: ids.iter().map(|s| s.to_string()).collect(),
        window_exceeded,
    }
}

/// Transaction links in the order alerts were sent to `chat_id`.
fn alerted_txs(channel: &RecordingChannel, chat_id: i64) -> Vec<String> {
    channel
        .attempts_for(chat_id)
        .iter()
        .filter_map(|m| {
            m.text
                .split("/tx/")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .map(str::to_string)
        })
        .collect()
}

#[tokio::test]
async fn first_scan_arms_without_alerting() {
    let s = setup();
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx3", "tx2", "tx1"]));

    let outcome = s.monitor.scan().await;

    assert_eq!(
        outcome,
        ScanOutcome::Armed {
            cursor: Some("tx3".to_string())
        }
    );
    assert!(s.channel.attempts().is_empty());
}

#[tokio::test]
async fn new_events_are_sent_oldest_first() {
    let s = setup();
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx5", "tx4"]));
    s.source.push_batch(page(&["tx8", "tx7", "tx6", "tx5"]));

    s.monitor.scan().await;
    let outcome = s.monitor.scan().await;

    assert_eq!(outcome, completed(&["tx6", "tx7", "tx8"], false));
    assert_eq!(alerted_txs(&s.channel, 1), vec!["tx6", "tx7", "tx8"]);
    assert_eq!(s.monitor.cursor().last_seen_id(), Some("tx8"));
}

#[tokio::test]
async fn burst_beyond_window_sends_whole_page() {
    let s = setup();
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx1"]));
    s.source.push_batch(page(&["tx9", "tx8", "tx7"]));

    s.monitor.scan().await;
    let outcome = s.monitor.scan().await;

    assert_eq!(outcome, completed(&["tx7", "tx8", "tx9"], true));
    assert_eq!(s.monitor.cursor().last_seen_id(), Some("tx9"));
}

#[tokio::test]
async fn overlapping_pages_alert_each_event_once() {
    let s = setup();
    s.monitor.subscribers().subscribe(1).await;
    let pages: [&[&str]; 5] = [
        &["a2", "a1"],
        &["a3", "a2", "a1"],
        &["a3", "a2", "a1"],
        &["a6", "a5", "a4", "a3"],
        &["a7", "a6", "a5", "a4"],
    ];
    for ids in pages {
        s.source.push_batch(page(ids));
    }

    let mut cursors = Vec::new();
    for _ in 0..pages.len() {
        s.monitor.scan().await;
        cursors.push(s.monitor.cursor().last_seen_id().map(str::to_string));
    }

    assert_eq!(alerted_txs(&s.channel, 1), vec!["a3", "a4", "a5", "a6", "a7"]);
    let heads: Vec<Option<String>> = pages.iter().map(|p| Some(p[0].to_string())).collect();
    assert_eq!(cursors, heads);
}

#[tokio::test]
async fn empty_page_keeps_cursor() {
    let s = setup();
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx2"]));
    s.source.push_batch(Vec::new());

    s.monitor.scan().await;
    let outcome = s.monitor.scan().await;

    assert_eq!(outcome, completed(&[], false));
    assert_eq!(s.monitor.cursor().last_seen_id(), Some("tx2"));
}

#[tokio::test]
async fn blocked_subscriber_is_pruned_others_still_receive() {
    let channel = RecordingChannel::new();
    channel.fail_chat(2, DeliveryError::PermanentReject("Forbidden: bot was blocked by the user".into()));
    let s = setup_with(channel, AlertMedia::none());
    for chat in [1, 2, 3] {
        s.monitor.subscribers().subscribe(chat).await;
    }
    s.source.push_batch(page(&["tx1"]));
    s.source.push_batch(page(&["tx2", "tx1"]));

    s.monitor.scan().await;
    s.monitor.scan().await;

    assert!(!s.monitor.subscribers().is_subscribed(2));
    assert_eq!(s.monitor.subscribers().count(), 2);
    assert_eq!(alerted_txs(&s.channel, 1), vec!["tx2"]);
    assert_eq!(alerted_txs(&s.channel, 3), vec!["tx2"]);
}

#[tokio::test]
async fn remote_media_not_tried_when_local_succeeds() {
    let path = std::env::temp_dir().join(format!("og88-flow-{}.mp4", std::process::id()));
    std::fs::write(&path, b"video").unwrap();
    let s = setup_with(
        RecordingChannel::new(),
        AlertMedia::new(Some(path.clone()), Some("https://example.com/burn.gif".into())),
    );
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx1"]));
    s.source.push_batch(page(&["tx2", "tx1"]));

    s.monitor.scan().await;
    s.monitor.scan().await;

    let attempts = s.channel.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].media, Some(MediaRef::LocalFile(path.clone())));
    assert_eq!(MediaKind::of(attempts[0].media.as_ref()), MediaKind::Local);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn slow_delivery_does_not_prune() {
    let s = setup_with(RecordingChannel::with_delay(Duration::from_secs(2)), AlertMedia::none());
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx1"]));
    s.source.push_batch(page(&["tx2", "tx1"]));

    s.monitor.scan().await;
    let outcome = s.monitor.scan().await;

    assert_eq!(outcome, completed(&["tx2"], false));
    assert!(s.monitor.subscribers().is_subscribed(1));
}

#[tokio::test(start_paused = true)]
async fn run_polls_on_interval() {
    let s = setup();
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx1"]));
    s.source.push_batch(page(&["tx2", "tx1"]));

    let handle = tokio::spawn(Arc::clone(&s.monitor).run());
    tokio::time::sleep(Duration::from_secs(61)).await;
    handle.abort();

    assert_eq!(s.source.calls(), 2);
    assert_eq!(alerted_txs(&s.channel, 1), vec!["tx2"]);
}

#[tokio::test(start_paused = true)]
async fn hanging_fetch_times_out_and_next_scan_recovers() {
    let s = setup();
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx1"]));
    s.monitor.scan().await;

    s.source.set_delay(Some(Duration::from_secs(3600)));
    s.source.push_batch(page(&["tx2", "tx1"]));
    let outcome = s.monitor.scan().await;

    assert_eq!(outcome, ScanOutcome::Skipped(SkipReason::FetchFailed));
    assert_eq!(s.monitor.cursor().last_seen_id(), Some("tx1"));
    assert!(s.channel.attempts().is_empty());

    s.source.set_delay(None);
    let outcome = s.monitor.scan().await;

    assert_eq!(outcome, completed(&["tx2"], false));
    assert_eq!(alerted_txs(&s.channel, 1), vec!["tx2"]);
}

#[tokio::test]
async fn event_without_id_is_sent_again_until_it_leaves_the_page() {
    let s = setup();
    s.monitor.subscribers().subscribe(1).await;
    s.source.push_batch(page(&["tx1"]));
    s.source.push_batch(page(&["", "tx1"]));
    s.source.push_batch(page(&["", "tx1"]));

    s.monitor.scan().await;
    let first = s.monitor.scan().await;
    let second = s.monitor.scan().await;

    assert_eq!(first, completed(&[""], false));
    assert_eq!(second, completed(&[""], false));
    assert_eq!(s.monitor.cursor().last_seen_id(), Some("tx1"));
    assert_eq!(s.channel.attempts_for(1).len(), 2);
}

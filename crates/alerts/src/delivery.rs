//! Delivery channel abstraction.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Media attached to an alert.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaRef {
    /// Animation uploaded from a local file.
    LocalFile(PathBuf),
    /// Animation hosted remotely.
    Url(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The destination will never accept messages from this sender again.
    #[error("Destination rejected the sender permanently: {0}")]
    PermanentReject(String),
    /// Network failure, rate limit, timeout or any other recoverable error.
    #[error("Delivery failed: {0}")]
    Transient(String),
}

impl DeliveryError {
    #[inline]
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::PermanentReject(_))
    }
}

/// Outbound message channel to chat destinations.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Send `text`, as a caption of `media` when given.
    async fn send(&self, chat_id: i64, text: &str, media: Option<&MediaRef>) -> Result<(), DeliveryError>;
}

/// One recorded delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub media: Option<MediaRef>,
}

/// Recording channel for tests with per-chat scripted failures.
#[derive(Default)]
pub struct RecordingChannel {
    attempts: Mutex<Vec<SentMessage>>,
    failures: Mutex<HashMap<i64, Vec<(Option<MediaKind>, DeliveryError)>>>,
    delay: Option<std::time::Duration>,
}

/// Which kind of attempt a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Local,
    Remote,
    Text,
}

impl MediaKind {
    pub fn of(media: Option<&MediaRef>) -> Self {
        match media {
            Some(MediaRef::LocalFile(_)) => MediaKind::Local,
            Some(MediaRef::Url(_)) => MediaKind::Remote,
            None => MediaKind::Text,
        }
    }
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that sleeps before every attempt.
    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail every attempt to `chat_id`.
    pub fn fail_chat(&self, chat_id: i64, error: DeliveryError) {
        self.push_failure(chat_id, None, error);
    }

    /// Fail attempts of one kind to `chat_id`.
    pub fn fail_kind(&self, chat_id: i64, kind: MediaKind, error: DeliveryError) {
        self.push_failure(chat_id, Some(kind), error);
    }

    fn push_failure(&self, chat_id: i64, kind: Option<MediaKind>, error: DeliveryError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.entry(chat_id).or_default().push((kind, error));
        }
    }

    /// Every attempt in order, successful or not.
    pub fn attempts(&self) -> Vec<SentMessage> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Attempts made to one chat.
    pub fn attempts_for(&self, chat_id: i64) -> Vec<SentMessage> {
        self.attempts()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect()
    }

    fn scripted_failure(&self, chat_id: i64, kind: MediaKind) -> Option<DeliveryError> {
        let failures = self.failures.lock().ok()?;
        failures
            .get(&chat_id)?
            .iter()
            .find(|(k, _)| k.map_or(true, |k| k == kind))
            .map(|(_, e)| e.clone())
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, chat_id: i64, text: &str, media: Option<&MediaRef>) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(SentMessage {
                chat_id,
                text: text.to_string(),
                media: media.cloned(),
            });
        }
        match self.scripted_failure(chat_id, MediaKind::of(media)) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

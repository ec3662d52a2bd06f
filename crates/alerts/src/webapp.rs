//! Bamboo Bash WebApp submissions.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Submissions kept in memory, newest first.
pub const GAME_HISTORY_LIMIT: usize = 25;

/// Rows shown by `/play recent`.
pub const RECENT_GAMES_LIMIT: usize = 5;

/// Payload keys read as the score, first present wins.
const SCORE_KEYS: [&str; 5] = ["score", "points", "value", "bestScore", "highscore"];

/// Telegram user behind a WebApp submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Player {
    pub user_id: Option<u64>,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

impl Player {
    pub fn display_name(&self) -> String {
        let non_blank = |s: &&String| !s.trim().is_empty();
        self.full_name
            .as_ref()
            .filter(non_blank)
            .or_else(|| self.username.as_ref().filter(non_blank))
            .cloned()
            .unwrap_or_else(|| "Unknown player".to_string())
    }
}

/// One recorded submission.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub player: Player,
    pub display_name: String,
    pub score: Option<String>,
    /// Parsed JSON body, or the raw text when it is not JSON.
    pub payload: Value,
    pub recorded_at: DateTime<Utc>,
}

impl GameResult {
    pub fn from_payload(player: Player, raw: &str, recorded_at: DateTime<Utc>) -> Self {
        let payload = if raw.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };
        Self {
            display_name: player.display_name(),
            score: extract_score(&payload),
            player,
            payload,
            recorded_at,
        }
    }
}

/// Score from a JSON object payload. Null and empty strings count as no score.
pub fn extract_score(payload: &Value) -> Option<String> {
    let object = payload.as_object()?;
    let value = SCORE_KEYS.iter().find_map(|key| object.get(*key))?;
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Rolling log of the latest submissions.
#[derive(Default)]
pub struct GameHistory {
    entries: Mutex<VecDeque<GameResult>>,
}

impl GameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submission, dropping the oldest past the limit.
    pub fn record(&self, result: GameResult) {
        let mut entries = self.lock();
        entries.push_front(result);
        entries.truncate(GAME_HISTORY_LIMIT);
    }

    /// Up to `limit` submissions, newest first.
    pub fn recent(&self, limit: usize) -> Vec<GameResult> {
        self.lock().iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<GameResult>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! Cursor-based novelty detection over polled, overlapping event pages.
//!
//! A feed page is most-recent-first. The cursor remembers the newest
//! identifier seen so far; everything above it in the next page is new.

use crate::event::ChainEvent;
use serde::{Deserialize, Serialize};

/// Last-seen event identifier for one event class.
///
/// `None` means the class has never completed an arming scan. Once set the
/// cursor never returns to `None` and only ever holds an identifier that was
/// present in a fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    last_seen_id: Option<String>,
}

/// Result of diffing one page against the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutcome {
    /// New events, oldest first.
    pub new_events: Vec<ChainEvent>,
    /// The page was used to arm an uninitialized cursor.
    pub armed: bool,
    /// The stored identifier was not found in the page.
    pub window_exceeded: bool,
}

impl DiffOutcome {
    fn empty() -> Self {
        Self {
            new_events: Vec::new(),
            armed: false,
            window_exceeded: false,
        }
    }
}

impl Cursor {
    /// Uninitialized cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor restored at a known identifier. Empty identifiers are ignored.
    pub fn at(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            last_seen_id: (!id.trim().is_empty()).then_some(id),
        }
    }

    /// Last-seen identifier, if armed.
    pub fn last_seen_id(&self) -> Option<&str> {
        self.last_seen_id.as_deref()
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.last_seen_id.is_some()
    }

    /// Arm an uninitialized cursor from a page without emitting anything.
    /// Returns true if the cursor changed.
    pub fn arm(&mut self, batch: &[ChainEvent]) -> bool {
        if self.is_armed() {
            return false;
        }
        match newest_valid_id(batch) {
            Some(id) => {
                self.last_seen_id = Some(id.to_string());
                true
            }
            None => false,
        }
    }

    /// Diff a most-recent-first page against the cursor and advance it.
    ///
    /// - empty page: nothing new, cursor unchanged
    /// - uninitialized cursor: arm at the newest identifier, nothing new
    /// - otherwise everything above the stored identifier is new; if the
    ///   identifier is absent the whole page is new
    ///
    /// An event without an identifier is collected as new and stops the scan.
    pub fn diff(&mut self, batch: &[ChainEvent]) -> DiffOutcome {
        if batch.is_empty() {
            return DiffOutcome::empty();
        }

        let last_seen = match self.last_seen_id.as_deref() {
            Some(id) => id,
            None => {
                let armed = self.arm(batch);
                return DiffOutcome {
                    armed,
                    ..DiffOutcome::empty()
                };
            }
        };

        let mut collected = Vec::new();
        let mut matched = false;
        for event in batch {
            if !event.has_valid_id() {
                collected.push(event.clone());
                break;
            }
            if event.id == last_seen {
                matched = true;
                break;
            }
            collected.push(event.clone());
        }

        let window_exceeded = !matched && collected.len() == batch.len();

        if let Some(id) = newest_valid_id(batch) {
            self.last_seen_id = Some(id.to_string());
        }

        collected.reverse();
        DiffOutcome {
            new_events: collected,
            armed: false,
            window_exceeded,
        }
    }
}

fn newest_valid_id(batch: &[ChainEvent]) -> Option<&str> {
    batch
        .iter()
        .find(|event| event.has_valid_id())
        .map(|event| event.id.as_str())
}

//! Per-class subscriber registry.

use crate::db::Database;
use og88_core::EventClass;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{info, warn};

/// Chats opted in to one event class.
///
/// Every add/remove is atomic under the registry mutex and idempotent. When a
/// database is attached, changes are written through in the same order they
/// are applied in memory; a persistence failure is logged and never rolls back
/// the in-memory change.
pub struct SubscriberRegistry {
    class: EventClass,
    members: Mutex<HashSet<i64>>,
    db: Option<Database>,
    /// Held across a change and its write-through.
    writes: tokio::sync::Mutex<()>,
}

impl SubscriberRegistry {
    /// Empty in-memory registry.
    pub fn new(class: EventClass) -> Self {
        Self {
            class,
            members: Mutex::new(HashSet::new()),
            db: None,
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Registry restored from and persisted to `db`.
    pub async fn with_database(class: EventClass, db: Database) -> Self {
        let members = match db.load_subscribers(class).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(class = %class, error = %e, "Failed to load subscribers, starting empty");
                HashSet::new()
            }
        };
        info!(class = %class, count = members.len(), "Loaded subscribers");
        Self {
            class,
            members: Mutex::new(members),
            db: Some(db),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    pub fn class(&self) -> EventClass {
        self.class
    }

    /// Add a chat. Returns true if it was not subscribed before.
    pub async fn subscribe(&self, chat_id: i64) -> bool {
        let _write = self.writes.lock().await;
        let added = self.lock().insert(chat_id);
        if added {
            if let Some(db) = &self.db {
                if let Err(e) = db.add_subscriber(self.class, chat_id).await {
                    warn!(class = %self.class, chat_id, error = %e, "Failed to persist subscription");
                }
            }
        }
        added
    }

    /// Remove a chat. Returns true if it was subscribed.
    pub async fn unsubscribe(&self, chat_id: i64) -> bool {
        let _write = self.writes.lock().await;
        let removed = self.lock().remove(&chat_id);
        if removed {
            if let Some(db) = &self.db {
                if let Err(e) = db.remove_subscriber(self.class, chat_id).await {
                    warn!(class = %self.class, chat_id, error = %e, "Failed to persist unsubscription");
                }
            }
        }
        removed
    }

    pub fn is_subscribed(&self, chat_id: i64) -> bool {
        self.lock().contains(&chat_id)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Point-in-time copy of the members, for fan-out.
    pub fn snapshot(&self) -> Vec<i64> {
        self.lock().iter().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<i64>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.members
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

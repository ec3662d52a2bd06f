//! SQLite persistence for alert subscriptions.

use og88_core::EventClass;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Database connection for subscriber storage.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // In-memory databases are per-connection; keep one so every query sees the schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                event_class TEXT NOT NULL,
                chat_id INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (event_class, chat_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All chats subscribed to a class.
    pub async fn load_subscribers(&self, class: EventClass) -> Result<Vec<i64>, DbError> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT chat_id FROM subscribers WHERE event_class = ? ORDER BY created_at",
        )
        .bind(class.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Add a subscription. Existing rows are left untouched.
    pub async fn add_subscriber(&self, class: EventClass, chat_id: i64) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (event_class, chat_id)
            VALUES (?, ?)
            ON CONFLICT(event_class, chat_id) DO NOTHING
            "#,
        )
        .bind(class.as_str())
        .bind(chat_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a subscription. Returns whether a row was deleted.
    pub async fn remove_subscriber(&self, class: EventClass, chat_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM subscribers WHERE event_class = ? AND chat_id = ?")
            .bind(class.as_str())
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of subscriptions stored for a class.
    pub async fn subscriber_count(&self, class: EventClass) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM subscribers WHERE event_class = ?",
        )
        .bind(class.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

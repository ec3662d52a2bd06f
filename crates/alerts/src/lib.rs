//! Burn and big-buy alerting for the OG88 token.
//!
//! This crate provides:
//! - Per-class subscriber registry with optional SQLite persistence
//! - Periodic monitors that diff polled pages against a cursor
//! - Alert fan-out with a local file / remote URL / text fallback chain
//! - Telegram command handling and delivery
//! - Bamboo Bash WebApp launch and score history

pub mod commands;
pub mod config;
pub mod db;
pub mod delivery;
pub mod dispatcher;
pub mod monitor;
pub mod render;
pub mod subscribers;
pub mod telegram;
pub mod webapp;

pub use commands::{Access, Command, CommandHandler, PlayAction, WatchAction};
pub use config::{AlertMedia, DispatcherConfig, MessageContext};
pub use db::Database;
pub use delivery::{DeliveryChannel, DeliveryError, MediaKind, MediaRef, RecordingChannel, SentMessage};
pub use dispatcher::{deliver_with_fallback, media_chain, AlertDispatcher, DeliveryOutcome, DispatchReport};
pub use monitor::{Monitor, MonitorConfig, ScanError, ScanOutcome, SkipReason};
pub use subscribers::SubscriberRegistry;
pub use telegram::{TelegramBot, TelegramChannel, TelegramError};
pub use webapp::{GameHistory, GameResult, Player};

//! Core data types for the OG88 chain alert bot.

pub mod amount;
pub mod cursor;
pub mod event;
pub mod price;
pub mod threshold;

pub use amount::*;
pub use cursor::*;
pub use event::*;
pub use price::*;
pub use threshold::{parse_decimal, resolve, resolve_raw, ThresholdError};

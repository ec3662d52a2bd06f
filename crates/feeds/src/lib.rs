//! External data collaborators: chain events, token price, token statistics.

pub mod blockscout;
pub mod error;
pub mod oracle;
pub mod source;
pub mod stats;

pub use blockscout::{BlockscoutClient, BlockscoutConfig};
pub use error::{FeedError, FeedResult};
pub use oracle::{HttpPriceOracle, MockPriceOracle, PriceOracle};
pub use source::{merge_pages, EventQuery, EventSource, MockEventSource};
pub use stats::{ChainStats, MockChainStats, SupplyOverview, TokenCounters};

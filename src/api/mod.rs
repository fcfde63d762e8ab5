use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Pair;

pub mod binance;
pub mod rate_limit;
pub mod types;

pub use binance::BinanceClient;
pub use rate_limit::RateLimiter;
pub use types::{RawKline, SymbolInfo};

pub const INTERVAL_1H: &str = "1h";

/// Source of exchange metadata and raw klines.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn exchange_metadata(&self) -> Result<Vec<SymbolInfo>>;

    /// Klines for `pair` opening in `[start, end)`, at most `limit` of them.
    async fn klines(
        &self,
        pair: &Pair,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RawKline>>;
}

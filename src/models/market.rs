use chrono::{DateTime, DurationRound, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

pub const HOUR_SECS: i64 = 3600;

/// A (base, quote) instrument, e.g. `ETH/USDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    pub base_asset: String,
    pub quote_asset: String,
}

impl Pair {
    pub fn new(base_asset: impl Into<String>, quote_asset: impl Into<String>) -> Self {
        Self {
            base_asset: base_asset.into(),
            quote_asset: quote_asset.into(),
        }
    }

    /// Exchange symbol, base and quote concatenated (`ETHUSDT`).
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base_asset, self.quote_asset)
    }

    pub fn is_quoted_in(&self, asset: &str) -> bool {
        self.quote_asset == asset
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base_asset, self.quote_asset)
    }
}

/// One normalized hourly bar. Times are epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub base_asset: String,
    pub quote_asset: String,
    pub open_time: i64,
    pub close_time: i64,
    pub open_price: f64,
    pub high: f64,
    pub low: f64,
    pub close_price: f64,
    pub number_of_trades: u64,
    pub volume: f64,
    pub quote_asset_volume: f64,
    pub taker_buy_base_asset_volume: f64,
    pub taker_buy_quote_asset_volume: f64,
}

impl Snapshot {
    pub fn pair(&self) -> Pair {
        Pair::new(self.base_asset.clone(), self.quote_asset.clone())
    }

    pub fn validate(&self) -> Result<()> {
        let pair = self.pair();
        if self.close_time - self.open_time != HOUR_SECS {
            return Err(Error::ApiInvalidData(format!(
                "{}: bar spans {}s, expected {}s",
                pair,
                self.close_time - self.open_time,
                HOUR_SECS
            )));
        }
        if self.open_time % HOUR_SECS != 0 {
            return Err(Error::ApiInvalidData(format!(
                "{}: open time {} is not hour aligned",
                pair, self.open_time
            )));
        }

        let numbers = [
            self.open_price,
            self.high,
            self.low,
            self.close_price,
            self.volume,
            self.quote_asset_volume,
            self.taker_buy_base_asset_volume,
            self.taker_buy_quote_asset_volume,
        ];
        if numbers.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::ApiInvalidData(format!(
                "{}: negative or non-finite bar value",
                pair
            )));
        }

        if self.high < self.open_price.max(self.close_price).max(self.low)
            || self.low > self.open_price.min(self.close_price).min(self.high)
        {
            return Err(Error::ApiInvalidData(format!(
                "{}: high/low do not bound open/close (h={}, l={}, o={}, c={})",
                pair, self.high, self.low, self.open_price, self.close_price
            )));
        }
        Ok(())
    }
}

/// All snapshots of one fetch cycle, keyed by pair in fetch order.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSet {
    open_time: i64,
    snapshots: IndexMap<Pair, Snapshot>,
}

impl SnapshotSet {
    /// Builds a set; every member must share `open_time`. Duplicate pairs keep the first entry.
    pub fn from_snapshots(
        open_time: i64,
        snapshots: impl IntoIterator<Item = Snapshot>,
    ) -> Result<Self> {
        let mut map = IndexMap::new();
        for snapshot in snapshots {
            if snapshot.open_time != open_time {
                return Err(Error::ApiInvalidData(format!(
                    "{}: open time {} does not match cycle open time {}",
                    snapshot.pair(),
                    snapshot.open_time,
                    open_time
                )));
            }
            map.entry(snapshot.pair()).or_insert(snapshot);
        }
        Ok(Self {
            open_time,
            snapshots: map,
        })
    }

    pub fn open_time(&self) -> i64 {
        self.open_time
    }

    pub fn close_time(&self) -> i64 {
        self.open_time + HOUR_SECS
    }

    pub fn get(&self, pair: &Pair) -> Option<&Snapshot> {
        self.snapshots.get(pair)
    }

    pub fn contains(&self, pair: &Pair) -> bool {
        self.snapshots.contains_key(pair)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pair, &Snapshot)> {
        self.snapshots.iter()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.values()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Truncates to the start of the hour (minute, second and sub-second zeroed).
pub fn truncate_to_hour(time: DateTime<Utc>) -> DateTime<Utc> {
    time.duration_trunc(chrono::Duration::hours(1))
        .unwrap_or(time)
}

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use market_digest::api::{MarketDataProvider, RawKline, SymbolInfo};
use market_digest::config::Config;
use market_digest::error::{Error, Result};
use market_digest::models::{Pair, Snapshot};
use market_digest::store::SnapshotStore;

pub fn hour(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, h, 0, 0).unwrap()
}

pub fn kline(open_time: i64, close: f64, quote_volume: f64) -> RawKline {
    RawKline {
        open_time_ms: open_time * 1000,
        open: close.to_string(),
        high: close.to_string(),
        low: close.to_string(),
        close: close.to_string(),
        volume: "1".to_string(),
        close_time_ms: (open_time + 3600) * 1000 - 1,
        quote_volume: quote_volume.to_string(),
        trade_count: 25,
        taker_buy_base: "0.5".to_string(),
        taker_buy_quote: "0".to_string(),
    }
}

/// Exchange stand-in serving fixed metadata and bars keyed by (symbol, open time).
#[derive(Default)]
pub struct ScriptedProvider {
    symbols: Vec<SymbolInfo>,
    bars: HashMap<(String, i64), RawKline>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(mut self, base: &str, quote: &str) -> Self {
        self.symbols.push(SymbolInfo::new(base, quote, "TRADING"));
        self
    }

    pub fn bar(mut self, base: &str, quote: &str, open: DateTime<Utc>, close: f64, volume: f64) -> Self {
        let open_time = open.timestamp();
        self.bars.insert(
            (format!("{}{}", base, quote), open_time),
            kline(open_time, close, volume),
        );
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    async fn exchange_metadata(&self) -> Result<Vec<SymbolInfo>> {
        Ok(self.symbols.clone())
    }

    async fn klines(
        &self,
        pair: &Pair,
        _interval: &str,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: u32,
    ) -> Result<Vec<RawKline>> {
        self.requests.lock().unwrap().push(pair.symbol());
        Ok(self
            .bars
            .get(&(pair.symbol(), start.timestamp()))
            .cloned()
            .into_iter()
            .collect())
    }
}

/// BTC and ETH against USDT: 30000/2000 then 31500/1900, volumes 1000/500 then 1200/400.
pub fn two_asset_market() -> ScriptedProvider {
    ScriptedProvider::new()
        .listing("BTC", "USDT")
        .listing("ETH", "USDT")
        .bar("BTC", "USDT", hour(9), 30000.0, 1000.0)
        .bar("ETH", "USDT", hour(9), 2000.0, 500.0)
        .bar("BTC", "USDT", hour(10), 31500.0, 1200.0)
        .bar("ETH", "USDT", hour(10), 1900.0, 400.0)
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.analysis.numeraire_volume_floor = 0.0;
    config.analysis.reference_volume_floor = 0.0;
    config
}

/// A warehouse that rejects every write.
pub struct RejectingStore;

#[async_trait]
impl SnapshotStore for RejectingStore {
    async fn save(&self, _snapshots: &[Snapshot]) -> Result<()> {
        Err(Error::PersistenceFailure("warehouse is read-only".to_string()))
    }

    async fn query(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<Vec<Snapshot>> {
        Ok(Vec::new())
    }
}

/// Keeps every report it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub reports: std::sync::Arc<Mutex<Vec<market_digest::report::Report>>>,
}

#[async_trait]
impl market_digest::notify::Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, report: &market_digest::report::Report) -> Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

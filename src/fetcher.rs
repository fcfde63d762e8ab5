use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::api::{MarketDataProvider, INTERVAL_1H};
use crate::error::{Error, Result};
use crate::models::{truncate_to_hour, Pair, Snapshot, SnapshotSet};

/// Result of one fetch cycle: the snapshots that arrived plus the pairs that did not.
#[derive(Debug)]
pub struct FetchOutcome {
    pub set: SnapshotSet,
    pub failures: Vec<(Pair, Error)>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct SnapshotFetcher {
    provider: Arc<dyn MarketDataProvider>,
    max_concurrent_requests: usize,
}

impl SnapshotFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, max_concurrent_requests: usize) -> Self {
        Self {
            provider,
            max_concurrent_requests: max_concurrent_requests.max(1),
        }
    }

    /// Fetches the one-hour bar ending at the hour boundary `time` (truncated if needed).
    pub async fn fetch(&self, pair: &Pair, time: DateTime<Utc>) -> Result<Snapshot> {
        let end = truncate_to_hour(time);
        let start = end - Duration::hours(1);

        let klines = self.provider.klines(pair, INTERVAL_1H, start, end, 1).await?;
        let kline = klines
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoData { pair: pair.clone() })?;

        let snapshot = kline.into_snapshot(pair)?;
        if snapshot.open_time != start.timestamp() {
            return Err(Error::ApiInvalidData(format!(
                "{}: expected bar opening at {}, got {}",
                pair,
                start.timestamp(),
                snapshot.open_time
            )));
        }
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Fetches every watchlist pair. A failing pair is logged and reported, never fatal.
    pub async fn fetch_cycle(&self, watchlist: &[Pair], time: DateTime<Utc>) -> Result<FetchOutcome> {
        let end = truncate_to_hour(time);
        let open_time = (end - Duration::hours(1)).timestamp();
        info!(
            "Fetching {} pairs for window ending {} ({} concurrent)",
            watchlist.len(),
            end,
            self.max_concurrent_requests
        );

        let results: Vec<(Pair, Result<Snapshot>)> = stream::iter(watchlist.iter().cloned())
            .map(|pair| async move {
                let result = self.fetch(&pair, end).await;
                (pair, result)
            })
            .buffered(self.max_concurrent_requests)
            .collect()
            .await;

        let mut snapshots = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (pair, result) in results {
            match result {
                Ok(snapshot) => {
                    debug!("{}: close {} volume {}", pair, snapshot.close_price, snapshot.quote_asset_volume);
                    snapshots.push(snapshot);
                }
                Err(e) => {
                    if e.is_pair_local() {
                        warn!("Skipping {}: {}", pair, e);
                    } else {
                        error!("Skipping {} after request failure: {}", pair, e);
                    }
                    failures.push((pair, e));
                }
            }
        }

        let set = SnapshotSet::from_snapshots(open_time, snapshots)?;
        info!(
            "Fetched {} of {} pairs ({} skipped)",
            set.len(),
            watchlist.len(),
            failures.len()
        );
        Ok(FetchOutcome { set, failures })
    }
}

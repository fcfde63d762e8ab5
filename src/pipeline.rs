//! One hourly cycle end to end: resolve, fetch, persist, record, analyze,
//! format and notify. `Pipeline` owns every collaborator and the history.

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::{error, info, warn};
use std::sync::Arc;

use crate::analysis::{AnalysisOutcome, DeltaAnalyzer};
use crate::api::MarketDataProvider;
use crate::config::{Config, CycleConfig};
use crate::error::{Error, Result};
use crate::fetcher::SnapshotFetcher;
use crate::history::SnapshotHistory;
use crate::models::{truncate_to_hour, Pair, Snapshot, SnapshotSet};
use crate::notify::Notifier;
use crate::report::{Report, ReportFormatter, ReportWindow};
use crate::store::SnapshotStore;
use crate::watchlist::WatchlistResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// A report was produced (and handed to the notifiers if enabled).
    Reported,
    InsufficientHistory,
    EmptyUniverse,
    /// Some pairs failed and partial sets are not recorded.
    Discarded,
    /// Every pair failed; the history is left untouched.
    NothingFetched,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub boundary: DateTime<Utc>,
    pub status: CycleStatus,
    pub watchlist_len: usize,
    pub fetched: usize,
    pub failed_pairs: Vec<Pair>,
    pub report: Option<Report>,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

impl CycleReport {
    fn new(boundary: DateTime<Utc>, status: CycleStatus) -> Self {
        Self {
            boundary,
            status,
            watchlist_len: 0,
            fetched: 0,
            failed_pairs: Vec::new(),
            report: None,
            notifications_sent: 0,
            notifications_failed: 0,
        }
    }
}

pub struct Pipeline {
    provider: Arc<dyn MarketDataProvider>,
    resolver: WatchlistResolver,
    fetcher: SnapshotFetcher,
    analyzer: DeltaAnalyzer,
    formatter: ReportFormatter,
    store: Arc<dyn SnapshotStore>,
    notifiers: Vec<Box<dyn Notifier>>,
    history: SnapshotHistory,
    cycle: CycleConfig,
    notifications_enabled: bool,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn SnapshotStore>,
        notifiers: Vec<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            fetcher: SnapshotFetcher::new(
                provider.clone(),
                config.exchange.max_concurrent_requests,
            ),
            provider,
            resolver: WatchlistResolver::new(config.universe.clone()),
            analyzer: DeltaAnalyzer::new(&config.universe, config.analysis.clone()),
            formatter: ReportFormatter::new(config.notification.chart_url_base.clone()),
            store,
            notifiers,
            history: SnapshotHistory::new(),
            cycle: config.cycle.clone(),
            notifications_enabled: config.notification.enable_notifications,
        }
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    /// Processes the hour ending at `time` (truncated to the hour).
    ///
    /// Per-pair fetch failures never abort the cycle. A failed metadata fetch
    /// or a `PersistenceFailure` does, before anything is recorded or sent.
    /// Notification failures are logged and counted only.
    pub async fn run_cycle(&mut self, time: DateTime<Utc>) -> Result<CycleReport> {
        let boundary = truncate_to_hour(time);
        info!("Starting cycle for hour ending {}", boundary);

        let symbols = self.provider.exchange_metadata().await?;
        let watchlist = self.resolver.resolve(&symbols);

        let outcome = self.fetcher.fetch_cycle(&watchlist, boundary).await?;
        let mut cycle = CycleReport::new(boundary, CycleStatus::Reported);
        cycle.watchlist_len = watchlist.len();
        cycle.fetched = outcome.set.len();
        cycle.failed_pairs = outcome.failures.iter().map(|(p, _)| p.clone()).collect();

        if !outcome.is_complete() {
            if !self.cycle.record_partial_sets {
                warn!(
                    "Discarding cycle {}: {} of {} pairs failed",
                    boundary,
                    outcome.failures.len(),
                    watchlist.len()
                );
                cycle.status = CycleStatus::Discarded;
                return Ok(cycle);
            }
            warn!(
                "Recording partial set for {}: {} of {} pairs missing",
                boundary,
                outcome.failures.len(),
                watchlist.len()
            );
        }

        if outcome.set.is_empty() {
            warn!("Nothing fetched for {}, history left as is", boundary);
            cycle.status = CycleStatus::NothingFetched;
            return Ok(cycle);
        }

        let snapshots: Vec<Snapshot> = outcome.set.snapshots().cloned().collect();
        if let Err(e) = self.store.save(&snapshots).await {
            let e = match e {
                Error::PersistenceFailure(_) => e,
                other => Error::PersistenceFailure(other.to_string()),
            };
            error!("Cycle {} aborted, snapshots not persisted: {}", boundary, e);
            return Err(e);
        }

        let open_time = outcome.set.open_time();
        self.history.record(outcome.set);
        if !self.history.is_contiguous() && self.cycle.backfill_from_store {
            self.backfill(open_time).await;
        }

        let summary = match self.analyzer.analyze_history(&self.history) {
            AnalysisOutcome::Summary(summary) => summary,
            AnalysisOutcome::InsufficientHistory => {
                cycle.status = CycleStatus::InsufficientHistory;
                return Ok(cycle);
            }
            AnalysisOutcome::EmptyUniverse => {
                cycle.status = CycleStatus::EmptyUniverse;
                return Ok(cycle);
            }
        };

        let report = self
            .formatter
            .format(&summary, &ReportWindow::from_open_time(open_time));

        if self.notifications_enabled {
            for notifier in &self.notifiers {
                match notifier.send(&report).await {
                    Ok(()) => {
                        info!("Report delivered via {}", notifier.name());
                        cycle.notifications_sent += 1;
                    }
                    Err(e) => {
                        error!("Failed to deliver report via {}: {}", notifier.name(), e);
                        cycle.notifications_failed += 1;
                    }
                }
            }
        }

        cycle.report = Some(report);
        Ok(cycle)
    }

    /// Fills a missing or stale previous slot from the warehouse: rows opening
    /// in `[open_time - 1h, open_time)`. Failures leave the history as is.
    async fn backfill(&mut self, open_time: i64) {
        let previous_open = open_time - crate::models::HOUR_SECS;
        let (start, end) = match (
            Utc.timestamp_opt(previous_open, 0).single(),
            Utc.timestamp_opt(open_time, 0).single(),
        ) {
            (Some(start), Some(end)) => (start, end),
            _ => return,
        };

        let rows = match self.store.query(start, end).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Backfill query for {} failed: {}", start, e);
                return;
            }
        };
        if rows.is_empty() {
            info!("No stored snapshots for {}, history stays cold", start);
            return;
        }

        match SnapshotSet::from_snapshots(previous_open, rows) {
            Ok(set) => {
                info!("Backfilled {} snapshots for {} from the warehouse", set.len(), start);
                self.history.backfill(set);
            }
            Err(e) => warn!("Discarding stored snapshots for {}: {}", start, e),
        }
    }

    /// Runs a cycle at every hour boundary until the task is dropped.
    pub async fn run_hourly(&mut self) -> Result<()> {
        loop {
            let now = Utc::now();
            let next = truncate_to_hour(now) + Duration::hours(1);
            let wait = (next - now).to_std().unwrap_or_default();
            info!("Next cycle at {} (in {}s)", next, wait.as_secs());
            tokio::time::sleep(wait).await;

            match self.run_cycle(next).await {
                Ok(cycle) => info!(
                    "Cycle {} finished: {:?}, {} of {} pairs",
                    cycle.boundary, cycle.status, cycle.fetched, cycle.watchlist_len
                ),
                Err(e) => error!("Cycle {} failed: {}", next, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockMarketDataProvider, RawKline, SymbolInfo};
    use crate::notify::MockNotifier;
    use crate::store::MockSnapshotStore;
    use std::collections::HashMap;

    fn boundary(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, hour, 0, 0).unwrap()
    }

    fn kline(open_time: i64, close: f64, quote_volume: f64) -> RawKline {
        RawKline {
            open_time_ms: open_time * 1000,
            open: close.to_string(),
            high: close.to_string(),
            low: close.to_string(),
            close: close.to_string(),
            volume: "1".to_string(),
            close_time_ms: (open_time + 3600) * 1000 - 1,
            quote_volume: quote_volume.to_string(),
            trade_count: 10,
            taker_buy_base: "0".to_string(),
            taker_buy_quote: "0".to_string(),
        }
    }

    /// BTC and ETH against USDT for the hours ending at 10:00 and 11:00.
    fn provider(skip: Option<&'static str>) -> MockMarketDataProvider {
        let h9 = boundary(9).timestamp();
        let h10 = boundary(10).timestamp();
        let mut bars: HashMap<(String, i64), RawKline> = HashMap::new();
        bars.insert(("BTCUSDT".into(), h9), kline(h9, 30000.0, 1000.0));
        bars.insert(("ETHUSDT".into(), h9), kline(h9, 2000.0, 500.0));
        bars.insert(("BTCUSDT".into(), h10), kline(h10, 31500.0, 1200.0));
        bars.insert(("ETHUSDT".into(), h10), kline(h10, 1900.0, 400.0));

        let mut provider = MockMarketDataProvider::new();
        provider.expect_exchange_metadata().returning(|| {
            Ok(vec![
                SymbolInfo::new("BTC", "USDT", "TRADING"),
                SymbolInfo::new("ETH", "USDT", "TRADING"),
            ])
        });
        provider
            .expect_klines()
            .returning(move |pair, _, start, _, _| {
                if skip == Some(pair.base_asset.as_str()) {
                    return Ok(Vec::new());
                }
                Ok(bars
                    .get(&(pair.symbol(), start.timestamp()))
                    .cloned()
                    .into_iter()
                    .collect())
            });
        provider
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.analysis.numeraire_volume_floor = 0.0;
        config
    }

    fn accepting_store() -> MockSnapshotStore {
        let mut store = MockSnapshotStore::new();
        store.expect_save().returning(|_| Ok(()));
        store.expect_query().returning(|_, _| Ok(Vec::new()));
        store
    }

    fn notifier(result: fn() -> Result<()>, times: usize) -> Box<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_name().return_const("mock");
        notifier.expect_send().times(times).returning(move |_| result());
        Box::new(notifier)
    }

    #[test_log::test(tokio::test)]
    async fn test_two_cycles_produce_report() {
        let mut pipeline = Pipeline::new(
            &config(),
            Arc::new(provider(None)),
            Arc::new(accepting_store()),
            vec![notifier(|| Ok(()), 1)],
        );

        let first = pipeline.run_cycle(boundary(10)).await.unwrap();
        assert_eq!(first.status, CycleStatus::InsufficientHistory);
        assert!(first.report.is_none());

        let second = pipeline.run_cycle(boundary(11)).await.unwrap();
        assert_eq!(second.status, CycleStatus::Reported);
        assert_eq!(second.notifications_sent, 1);
        let report = second.report.unwrap();
        let gainers = report.section("Top gainers (USDT)").unwrap();
        assert_eq!(gainers.fields[0].name, "BTC");
        assert_eq!(gainers.fields[0].value, "5.00% ($31500)");
    }

    #[tokio::test]
    async fn test_persistence_failure_aborts_without_notifying() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_save()
            .returning(|_| Err(Error::DatabaseError("connection reset".into())));
        store.expect_query().never();

        let mut pipeline = Pipeline::new(
            &config(),
            Arc::new(provider(None)),
            Arc::new(store),
            vec![notifier(|| Ok(()), 0)],
        );

        let err = pipeline.run_cycle(boundary(10)).await.unwrap_err();
        assert!(matches!(err, Error::PersistenceFailure(_)));
        assert!(pipeline.history().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_cycle() {
        let mut pipeline = Pipeline::new(
            &config(),
            Arc::new(provider(None)),
            Arc::new(accepting_store()),
            vec![
                notifier(|| Err(Error::NotificationFailure("webhook down".into())), 1),
                notifier(|| Ok(()), 1),
            ],
        );

        tokio_test::assert_ok!(pipeline.run_cycle(boundary(10)).await);
        let cycle = tokio_test::assert_ok!(pipeline.run_cycle(boundary(11)).await);
        assert_eq!(cycle.status, CycleStatus::Reported);
        assert_eq!(cycle.notifications_failed, 1);
        assert_eq!(cycle.notifications_sent, 1);
    }

    #[tokio::test]
    async fn test_partial_cycle_discarded_when_configured() {
        let mut config = config();
        config.cycle.record_partial_sets = false;
        let mut store = MockSnapshotStore::new();
        store.expect_save().never();

        let mut pipeline = Pipeline::new(
            &config,
            Arc::new(provider(Some("ETH"))),
            Arc::new(store),
            Vec::new(),
        );

        let cycle = pipeline.run_cycle(boundary(10)).await.unwrap();
        assert_eq!(cycle.status, CycleStatus::Discarded);
        assert_eq!(cycle.failed_pairs, vec![Pair::new("ETH", "USDT")]);
        assert!(pipeline.history().is_empty());
    }

    #[tokio::test]
    async fn test_cold_start_backfills_previous_hour() {
        let h9 = boundary(9).timestamp();
        let stored = vec![
            kline(h9, 30000.0, 1000.0).into_snapshot(&Pair::new("BTC", "USDT")).unwrap(),
            kline(h9, 2000.0, 500.0).into_snapshot(&Pair::new("ETH", "USDT")).unwrap(),
        ];

        let mut store = MockSnapshotStore::new();
        store.expect_save().times(1).returning(|_| Ok(()));
        store
            .expect_query()
            .withf(|start, end| *start == boundary(9) && *end == boundary(10))
            .times(1)
            .returning(move |_, _| Ok(stored.clone()));

        let mut pipeline = Pipeline::new(
            &config(),
            Arc::new(provider(None)),
            Arc::new(store),
            Vec::new(),
        );

        // Processing 11:00 records the 10:00 bar; the 09:00 bar comes from storage.
        let cycle = pipeline.run_cycle(boundary(11)).await.unwrap();
        assert_eq!(cycle.status, CycleStatus::Reported);
        assert_eq!(pipeline.history().previous().unwrap().open_time(), h9);
    }

    #[tokio::test]
    async fn test_empty_fetch_keeps_last_good_set() {
        let mut pipeline = Pipeline::new(
            &config(),
            Arc::new(provider(None)),
            Arc::new(accepting_store()),
            Vec::new(),
        );
        pipeline.run_cycle(boundary(10)).await.unwrap();

        // No bars exist for the hour ending 13:00.
        let cycle = pipeline.run_cycle(boundary(13)).await.unwrap();
        assert_eq!(cycle.status, CycleStatus::NothingFetched);
        assert_eq!(cycle.fetched, 0);
        assert_eq!(pipeline.history().len(), 1);
        assert_eq!(
            pipeline.history().current().unwrap().open_time(),
            boundary(9).timestamp()
        );
    }

    #[tokio::test]
    async fn test_notifications_disabled_still_reports() {
        let mut config = config();
        config.notification.enable_notifications = false;
        let mut pipeline = Pipeline::new(
            &config,
            Arc::new(provider(None)),
            Arc::new(accepting_store()),
            vec![notifier(|| Ok(()), 0)],
        );

        pipeline.run_cycle(boundary(10)).await.unwrap();
        let cycle = pipeline.run_cycle(boundary(11)).await.unwrap();
        assert!(cycle.report.is_some());
        assert_eq!(cycle.notifications_sent, 0);
    }
}

//! Period-over-period comparison of two snapshot sets: per-pair deltas,
//! breadth over the numeraire-quoted universe and top-N rankings.

use log::{debug, info};
use serde::Serialize;

use crate::config::{AnalysisConfig, UniverseConfig};
use crate::history::SnapshotHistory;
use crate::models::{SnapshotSet, HOUR_SECS};

pub mod delta;
pub mod ranking;

pub use delta::{join, DeltaRow, Rate};
pub use ranking::{rank, Direction, RankKey};

/// How many rows moved up out of how many had a defined rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Breadth {
    pub up: usize,
    pub measured: usize,
}

impl Breadth {
    fn count<'a>(rates: impl Iterator<Item = &'a Rate>) -> Self {
        let mut breadth = Breadth { up: 0, measured: 0 };
        for rate in rates.filter(|r| r.is_defined()) {
            breadth.measured += 1;
            if rate.is_positive() {
                breadth.up += 1;
            }
        }
        breadth
    }

    pub fn ratio(&self) -> Rate {
        Rate::between(self.up as f64, self.measured as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rankings {
    pub gainers: Vec<DeltaRow>,
    pub losers: Vec<DeltaRow>,
    pub volume_gainers: Vec<DeltaRow>,
    pub reference_gainers: Vec<DeltaRow>,
    pub reference_losers: Vec<DeltaRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub numeraire: String,
    pub reference_asset: String,
    /// Numeraire-quoted pairs present in both cycles.
    pub total_asset_count: usize,
    pub total_volume: f64,
    pub previous_total_volume: f64,
    pub total_volume_change_rate: Rate,
    pub price_up: Breadth,
    pub volume_up: Breadth,
    /// The reference asset quoted in the numeraire, if it was in both cycles.
    pub reference_asset_data: Option<DeltaRow>,
    pub rankings: Rankings,
}

impl AnalysisSummary {
    pub fn price_up_ratio(&self) -> Rate {
        self.price_up.ratio()
    }

    pub fn volume_up_ratio(&self) -> Rate {
        self.volume_up.ratio()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Summary(Box<AnalysisSummary>),
    /// Fewer than two cycles recorded, or the two are not adjacent hours.
    InsufficientHistory,
    /// No numeraire-quoted pair is present in both cycles.
    EmptyUniverse,
}

impl AnalysisOutcome {
    pub fn summary(&self) -> Option<&AnalysisSummary> {
        match self {
            AnalysisOutcome::Summary(summary) => Some(summary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeltaAnalyzer {
    numeraire: String,
    reference_asset: String,
    config: AnalysisConfig,
}

impl DeltaAnalyzer {
    pub fn new(universe: &UniverseConfig, config: AnalysisConfig) -> Self {
        Self {
            numeraire: universe.numeraire.clone(),
            reference_asset: universe.reference_asset.clone(),
            config,
        }
    }

    pub fn analyze_history(&self, history: &SnapshotHistory) -> AnalysisOutcome {
        self.analyze(history.current(), history.previous())
    }

    pub fn analyze(
        &self,
        current: Option<&SnapshotSet>,
        previous: Option<&SnapshotSet>,
    ) -> AnalysisOutcome {
        let (current, previous) = match (current, previous) {
            (Some(current), Some(previous)) => (current, previous),
            _ => {
                info!("Insufficient history, skipping analysis");
                return AnalysisOutcome::InsufficientHistory;
            }
        };

        if current.open_time() - previous.open_time() != HOUR_SECS {
            info!(
                "Previous set opens at {}, not one hour before {}, skipping analysis",
                previous.open_time(),
                current.open_time()
            );
            return AnalysisOutcome::InsufficientHistory;
        }

        let rows = join(current, previous);
        debug!(
            "Joined {} rows ({} current, {} previous)",
            rows.len(),
            current.len(),
            previous.len()
        );

        let numeraire_rows: Vec<&DeltaRow> = rows
            .iter()
            .filter(|row| row.pair.is_quoted_in(&self.numeraire))
            .collect();
        let reference_rows: Vec<&DeltaRow> = rows
            .iter()
            .filter(|row| row.pair.is_quoted_in(&self.reference_asset))
            .collect();

        let total_asset_count = numeraire_rows.len();
        if total_asset_count == 0 {
            info!("No {} pairs in both cycles, skipping analysis", self.numeraire);
            return AnalysisOutcome::EmptyUniverse;
        }

        let total_volume: f64 = numeraire_rows.iter().map(|r| r.quote_asset_volume).sum();
        let previous_total_volume: f64 = numeraire_rows
            .iter()
            .map(|r| r.previous_quote_asset_volume)
            .sum();

        let price_up = Breadth::count(numeraire_rows.iter().map(|r| &r.price_change_rate));
        let volume_up = Breadth::count(numeraire_rows.iter().map(|r| &r.volume_change_rate));

        let reference_asset_data = numeraire_rows
            .iter()
            .find(|r| r.pair.base_asset == self.reference_asset)
            .map(|r| (*r).clone());

        let limit = self.config.ranking_count;
        let numeraire_floor = self.config.numeraire_volume_floor;
        let reference_floor = self.config.reference_volume_floor;
        let rankings = Rankings {
            gainers: rank(
                numeraire_rows.iter().copied(),
                RankKey::PriceChangeRate,
                Direction::Descending,
                numeraire_floor,
                limit,
            ),
            losers: rank(
                numeraire_rows.iter().copied(),
                RankKey::PriceChangeRate,
                Direction::Ascending,
                numeraire_floor,
                limit,
            ),
            volume_gainers: rank(
                numeraire_rows.iter().copied(),
                RankKey::VolumeChangeRate,
                Direction::Descending,
                numeraire_floor,
                limit,
            ),
            reference_gainers: rank(
                reference_rows.iter().copied(),
                RankKey::PriceChangeRate,
                Direction::Descending,
                reference_floor,
                limit,
            ),
            reference_losers: rank(
                reference_rows.iter().copied(),
                RankKey::PriceChangeRate,
                Direction::Ascending,
                reference_floor,
                limit,
            ),
        };

        info!(
            "Analyzed {} {} pairs: {}/{} up, {}/{} volume up",
            total_asset_count,
            self.numeraire,
            price_up.up,
            price_up.measured,
            volume_up.up,
            volume_up.measured
        );

        AnalysisOutcome::Summary(Box::new(AnalysisSummary {
            numeraire: self.numeraire.clone(),
            reference_asset: self.reference_asset.clone(),
            total_asset_count,
            total_volume,
            previous_total_volume,
            total_volume_change_rate: Rate::between(
                total_volume - previous_total_volume,
                previous_total_volume,
            ),
            price_up,
            volume_up,
            reference_asset_data,
            rankings,
        }))
    }
}

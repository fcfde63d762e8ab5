use serde::Serialize;

use crate::models::{Pair, Snapshot, SnapshotSet};

/// A change ratio. `Undefined` when the previous value was zero; such rows
/// never take part in rankings or breadth counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Rate {
    Defined(f64),
    Undefined,
}

impl Rate {
    /// `change / base`, undefined for a zero base.
    pub fn between(change: f64, base: f64) -> Self {
        if base == 0.0 {
            return Rate::Undefined;
        }
        let rate = change / base;
        if rate.is_finite() {
            Rate::Defined(rate)
        } else {
            Rate::Undefined
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Rate::Defined(v) => Some(*v),
            Rate::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Rate::Defined(_))
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Rate::Defined(v) if *v > 0.0)
    }
}

/// Current vs. previous comparison for one pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRow {
    pub pair: Pair,
    pub close_price: f64,
    pub previous_close_price: f64,
    pub quote_asset_volume: f64,
    pub previous_quote_asset_volume: f64,
    pub price_change: f64,
    pub price_change_rate: Rate,
    pub volume_change: f64,
    pub volume_change_rate: Rate,
}

impl DeltaRow {
    pub fn compute(current: &Snapshot, previous: &Snapshot) -> Self {
        let price_change = current.close_price - previous.close_price;
        let volume_change = current.quote_asset_volume - previous.quote_asset_volume;

        Self {
            pair: current.pair(),
            close_price: current.close_price,
            previous_close_price: previous.close_price,
            quote_asset_volume: current.quote_asset_volume,
            previous_quote_asset_volume: previous.quote_asset_volume,
            price_change,
            price_change_rate: Rate::between(price_change, previous.close_price),
            volume_change,
            volume_change_rate: Rate::between(volume_change, previous.quote_asset_volume),
        }
    }
}

/// Inner join on pair, in the current set's order.
pub fn join(current: &SnapshotSet, previous: &SnapshotSet) -> Vec<DeltaRow> {
    current
        .iter()
        .filter_map(|(pair, snapshot)| {
            previous
                .get(pair)
                .map(|prev| DeltaRow::compute(snapshot, prev))
        })
        .collect()
}

use std::cmp::Ordering;

use crate::analysis::delta::{DeltaRow, Rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankKey {
    PriceChangeRate,
    VolumeChangeRate,
}

impl RankKey {
    fn rate(&self, row: &DeltaRow) -> Rate {
        match self {
            RankKey::PriceChangeRate => row.price_change_rate,
            RankKey::VolumeChangeRate => row.volume_change_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Top `limit` rows by `key`. Rows below `volume_floor` or with an undefined
/// key are left out; equal keys keep their input order.
pub fn rank<'a>(
    rows: impl IntoIterator<Item = &'a DeltaRow>,
    key: RankKey,
    direction: Direction,
    volume_floor: f64,
    limit: usize,
) -> Vec<DeltaRow> {
    let mut ranked: Vec<(f64, &DeltaRow)> = rows
        .into_iter()
        .filter(|row| row.quote_asset_volume >= volume_floor)
        .filter_map(|row| key.rate(row).value().map(|v| (v, row)))
        .collect();

    ranked.sort_by(|(a, _), (b, _)| {
        let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
        match direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|(_, row)| row.clone())
        .collect()
}

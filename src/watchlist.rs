//! Derives the pairs worth tracking from exchange-wide symbol metadata.

use indexmap::{IndexMap, IndexSet};
use log::{debug, info};

use crate::api::SymbolInfo;
use crate::config::UniverseConfig;
use crate::models::Pair;

#[derive(Debug, Clone)]
pub struct WatchlistResolver {
    universe: UniverseConfig,
}

impl WatchlistResolver {
    pub fn new(universe: UniverseConfig) -> Self {
        Self { universe }
    }

    fn is_leveraged(&self, base_asset: &str) -> bool {
        self.universe
            .leveraged_suffixes
            .iter()
            .any(|suffix| base_asset.len() > suffix.len() && base_asset.ends_with(suffix.as_str()))
    }

    /// Resolves the watchlist in metadata iteration order. Never fails: unusable
    /// records are dropped and empty input yields only the reference pair.
    pub fn resolve(&self, symbols: &[SymbolInfo]) -> Vec<Pair> {
        let reference = self.universe.reference_asset.as_str();
        let numeraire = self.universe.numeraire.as_str();
        let fallback = self.universe.fallback_numeraire.as_str();

        let mut quotes_by_base: IndexMap<&str, IndexSet<&str>> = IndexMap::new();
        for symbol in symbols {
            if !symbol.is_trading()
                || symbol.base_asset.is_empty()
                || symbol.quote_asset.is_empty()
                || self.is_leveraged(&symbol.base_asset)
            {
                continue;
            }
            quotes_by_base
                .entry(symbol.base_asset.as_str())
                .or_default()
                .insert(symbol.quote_asset.as_str());
        }

        let mut watchlist: IndexSet<Pair> = IndexSet::new();
        for (base, quotes) in &quotes_by_base {
            if quotes.contains(reference) {
                watchlist.insert(Pair::new(*base, reference));
            }

            if quotes.contains(numeraire) {
                watchlist.insert(Pair::new(*base, numeraire));
            } else if !fallback.is_empty() && quotes.contains(fallback) {
                debug!("{} has no {} market, using {}", base, numeraire, fallback);
                watchlist.insert(Pair::new(*base, fallback));
            }
        }

        // The reference row must always exist for the summary.
        watchlist.insert(Pair::new(reference, numeraire));

        info!(
            "Resolved watchlist: {} pairs from {} symbols ({} base assets)",
            watchlist.len(),
            symbols.len(),
            quotes_by_base.len()
        );
        watchlist.into_iter().collect()
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Pair, Snapshot};

pub const STATUS_TRADING: &str = "TRADING";

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

/// One listed symbol from exchange metadata. Missing fields decode as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    #[serde(default)]
    pub base_asset: String,
    #[serde(default)]
    pub quote_asset: String,
    #[serde(default)]
    pub status: String,
}

impl SymbolInfo {
    pub fn new(base_asset: &str, quote_asset: &str, status: &str) -> Self {
        Self {
            base_asset: base_asset.to_string(),
            quote_asset: quote_asset.to_string(),
            status: status.to_string(),
        }
    }

    pub fn is_trading(&self) -> bool {
        self.status == STATUS_TRADING
    }
}

type KlineTuple = (
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    u64,
    String,
    String,
    serde_json::Value,
);

/// One kline as returned by the exchange: a 12-element array whose prices
/// and volumes are decimal strings and whose times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "KlineTuple")]
pub struct RawKline {
    pub open_time_ms: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub close_time_ms: i64,
    pub quote_volume: String,
    pub trade_count: u64,
    pub taker_buy_base: String,
    pub taker_buy_quote: String,
}

impl From<KlineTuple> for RawKline {
    fn from(t: KlineTuple) -> Self {
        Self {
            open_time_ms: t.0,
            open: t.1,
            high: t.2,
            low: t.3,
            close: t.4,
            volume: t.5,
            close_time_ms: t.6,
            quote_volume: t.7,
            trade_count: t.8,
            taker_buy_base: t.9,
            taker_buy_quote: t.10,
        }
    }
}

fn parse_decimal(pair: &Pair, field: &str, raw: &str) -> Result<f64> {
    raw.trim().parse::<f64>().map_err(|_| {
        Error::ApiInvalidFormat(format!("{}: invalid {} value '{}'", pair, field, raw))
    })
}

impl RawKline {
    /// Maps the kline onto a `Snapshot` for `pair`.
    ///
    /// The exchange reports the inclusive last millisecond of the bar as its
    /// close time, so `close_time` rounds up to the next whole second.
    pub fn into_snapshot(self, pair: &Pair) -> Result<Snapshot> {
        Ok(Snapshot {
            base_asset: pair.base_asset.clone(),
            quote_asset: pair.quote_asset.clone(),
            open_time: self.open_time_ms.div_euclid(1000),
            close_time: (self.close_time_ms + 1).div_euclid(1000),
            open_price: parse_decimal(pair, "open", &self.open)?,
            high: parse_decimal(pair, "high", &self.high)?,
            low: parse_decimal(pair, "low", &self.low)?,
            close_price: parse_decimal(pair, "close", &self.close)?,
            number_of_trades: self.trade_count,
            volume: parse_decimal(pair, "volume", &self.volume)?,
            quote_asset_volume: parse_decimal(pair, "quote volume", &self.quote_volume)?,
            taker_buy_base_asset_volume: parse_decimal(pair, "taker buy base", &self.taker_buy_base)?,
            taker_buy_quote_asset_volume: parse_decimal(
                pair,
                "taker buy quote",
                &self.taker_buy_quote,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINE_JSON: &str = r#"[[1700002800000,"36500.10","36620.00","36410.55","36588.01","812.33100000",1700006399999,"29688412.53",20311,"401.2","14660012.9","0"]]"#;

    #[test]
    fn test_kline_decodes_from_array() {
        let klines: Vec<RawKline> = serde_json::from_str(KLINE_JSON).unwrap();
        assert_eq!(klines.len(), 1);
        assert_eq!(klines[0].open_time_ms, 1_700_002_800_000);
        assert_eq!(klines[0].trade_count, 20311);
        assert_eq!(klines[0].close, "36588.01");
    }

    #[test]
    fn test_kline_into_snapshot() {
        let kline = serde_json::from_str::<Vec<RawKline>>(KLINE_JSON)
            .unwrap()
            .remove(0);
        let snapshot = kline.into_snapshot(&Pair::new("BTC", "USDT")).unwrap();

        assert_eq!(snapshot.open_time, 1_700_002_800);
        assert_eq!(snapshot.close_time, 1_700_006_400);
        assert_eq!(snapshot.close_price, 36588.01);
        assert_eq!(snapshot.quote_asset_volume, 29688412.53);
        assert_eq!(snapshot.number_of_trades, 20311);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_kline_with_bad_number_is_rejected() {
        let mut kline = serde_json::from_str::<Vec<RawKline>>(KLINE_JSON)
            .unwrap()
            .remove(0);
        kline.high = "n/a".to_string();
        let err = kline.into_snapshot(&Pair::new("BTC", "USDT")).unwrap_err();
        assert!(matches!(err, Error::ApiInvalidFormat(_)));
    }

    #[test]
    fn test_symbol_info_tolerates_missing_fields() {
        let info: ExchangeInfo =
            serde_json::from_str(r#"{"symbols":[{"baseAsset":"ETH","status":"TRADING"}]}"#)
                .unwrap();
        assert_eq!(info.symbols[0].quote_asset, "");
        assert!(info.symbols[0].is_trading());
    }
}

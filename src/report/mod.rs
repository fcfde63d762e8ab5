//! Turns an analysis summary into notification-ready sections.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use crate::analysis::{AnalysisSummary, Breadth, DeltaRow, Rate};
use crate::models::HOUR_SECS;

const UNAVAILABLE: &str = "unavailable";
const UNDEFINED: &str = "n/a";
const DOLLAR_QUOTES: &[&str] = &["USD", "USDT", "USDC", "BUSD", "TUSD", "FDUSD"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportField {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ReportField {
    fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            url: None,
        }
    }

    fn with_url(mut self, url: String) -> Self {
        self.url = Some(url);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub title: String,
    pub fields: Vec<ReportField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub sections: Vec<ReportSection>,
}

impl Report {
    pub fn section(&self, title: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Plain text rendering, one block per section.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "{}", section.title);
            if section.fields.is_empty() {
                let _ = writeln!(out, "  (none)");
            }
            for field in &section.fields {
                let _ = writeln!(out, "  {}: {}", field.name, field.value);
            }
        }
        out
    }
}

/// The hour a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub open: DateTime<Utc>,
    pub close: DateTime<Utc>,
}

impl ReportWindow {
    pub fn from_open_time(open_time: i64) -> Self {
        let open = Utc.timestamp_opt(open_time, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC);
        let close = Utc
            .timestamp_opt(open_time + HOUR_SECS, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { open, close }
    }

    fn label(&self) -> String {
        format!(
            "{} - {}",
            self.open.format("%m/%d %H:%M"),
            self.close.format("%m/%d %H:%M")
        )
    }
}

/// Percentage floored (not rounded) to two decimals: `0.05129` -> `5.12%`.
pub fn format_ratio(rate: Rate) -> String {
    match rate.value() {
        Some(ratio) => {
            // Snap away binary representation error before flooring.
            let scaled = ((ratio * 10_000.0) * 1e6).round() / 1e6;
            format!("{:.2}%", scaled.floor() / 100.0)
        }
        None => UNDEFINED.to_string(),
    }
}

/// Floors to whole units and groups thousands: `1234567.9` -> `1,234,567`.
pub fn format_notional(value: f64) -> String {
    let whole = value.floor() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if whole < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

fn is_dollar(quote: &str) -> bool {
    DOLLAR_QUOTES.contains(&quote)
}

fn format_amount(value: f64, quote: &str) -> String {
    if is_dollar(quote) {
        format!("${}", format_notional(value))
    } else {
        format!("{} {}", format_notional(value), quote)
    }
}

fn format_price(price: f64, quote: &str) -> String {
    if is_dollar(quote) {
        format!("${}", price)
    } else {
        format!("{} {}", price, quote)
    }
}

fn format_breadth(breadth: &Breadth) -> String {
    format!(
        "{} ({}/{})",
        format_ratio(breadth.ratio()),
        breadth.up,
        breadth.measured
    )
}

#[derive(Debug, Clone)]
pub struct ReportFormatter {
    chart_url_base: String,
}

impl ReportFormatter {
    pub fn new(chart_url_base: impl Into<String>) -> Self {
        Self {
            chart_url_base: chart_url_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn chart_url(&self, row: &DeltaRow) -> String {
        format!(
            "{}/{}_{}",
            self.chart_url_base, row.pair.base_asset, row.pair.quote_asset
        )
    }

    pub fn format(&self, summary: &AnalysisSummary, window: &ReportWindow) -> Report {
        let numeraire = summary.numeraire.as_str();
        let reference = summary.reference_asset.as_str();
        let rankings = &summary.rankings;

        let sections = vec![
            self.summary_section(summary, window),
            self.price_section(
                format!("Top gainers ({})", numeraire),
                &rankings.gainers,
            ),
            self.price_section(
                format!("Top gainers ({})", reference),
                &rankings.reference_gainers,
            ),
            self.volume_section(
                format!("Top volume gainers ({})", numeraire),
                &rankings.volume_gainers,
            ),
            self.price_section(format!("Top losers ({})", numeraire), &rankings.losers),
            self.price_section(
                format!("Top losers ({})", reference),
                &rankings.reference_losers,
            ),
        ];
        Report { sections }
    }

    fn summary_section(&self, summary: &AnalysisSummary, window: &ReportWindow) -> ReportSection {
        let numeraire = summary.numeraire.as_str();
        let reference = summary.reference_asset.as_str();

        let (reference_price, reference_volume) = match &summary.reference_asset_data {
            Some(row) => (
                ReportField::new(
                    format!("{} price", reference),
                    format!(
                        "{} ({})",
                        format_price(row.close_price, numeraire),
                        format_ratio(row.price_change_rate)
                    ),
                )
                .with_url(self.chart_url(row)),
                ReportField::new(
                    format!("{} volume", reference),
                    format!(
                        "{} ({})",
                        format_amount(row.quote_asset_volume, numeraire),
                        format_ratio(row.volume_change_rate)
                    ),
                ),
            ),
            None => (
                ReportField::new(format!("{} price", reference), UNAVAILABLE),
                ReportField::new(format!("{} volume", reference), UNAVAILABLE),
            ),
        };

        ReportSection {
            title: "Summary".to_string(),
            fields: vec![
                ReportField::new("Window", window.label()),
                ReportField::new("Assets", summary.total_asset_count.to_string()),
                ReportField::new(
                    "Total volume",
                    format!(
                        "{} ({})",
                        format_amount(summary.total_volume, numeraire),
                        format_ratio(summary.total_volume_change_rate)
                    ),
                ),
                reference_price,
                reference_volume,
                ReportField::new("Price up ratio", format_breadth(&summary.price_up)),
                ReportField::new("Volume up ratio", format_breadth(&summary.volume_up)),
            ],
        }
    }

    fn price_section(&self, title: String, rows: &[DeltaRow]) -> ReportSection {
        let fields = rows
            .iter()
            .map(|row| {
                ReportField::new(
                    row.pair.base_asset.clone(),
                    format!(
                        "{} ({})",
                        format_ratio(row.price_change_rate),
                        format_price(row.close_price, &row.pair.quote_asset)
                    ),
                )
                .with_url(self.chart_url(row))
            })
            .collect();
        ReportSection { title, fields }
    }

    fn volume_section(&self, title: String, rows: &[DeltaRow]) -> ReportSection {
        let fields = rows
            .iter()
            .map(|row| {
                ReportField::new(
                    row.pair.base_asset.clone(),
                    format!(
                        "{} ({})",
                        format_ratio(row.volume_change_rate),
                        format_amount(row.quote_asset_volume, &row.pair.quote_asset)
                    ),
                )
                .with_url(self.chart_url(row))
            })
            .collect();
        ReportSection { title, fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Rankings;
    use crate::models::Pair;

    fn row(base: &str, quote: &str, close: f64, price_rate: f64, volume: f64, volume_rate: f64) -> DeltaRow {
        DeltaRow {
            pair: Pair::new(base, quote),
            close_price: close,
            previous_close_price: close,
            quote_asset_volume: volume,
            previous_quote_asset_volume: volume,
            price_change: 0.0,
            price_change_rate: Rate::Defined(price_rate),
            volume_change: 0.0,
            volume_change_rate: Rate::Defined(volume_rate),
        }
    }

    fn summary(reference: Option<DeltaRow>) -> AnalysisSummary {
        AnalysisSummary {
            numeraire: "USDT".to_string(),
            reference_asset: "BTC".to_string(),
            total_asset_count: 2,
            total_volume: 1_234_567.89,
            previous_total_volume: 1_000_000.0,
            total_volume_change_rate: Rate::Defined(0.23456789),
            price_up: Breadth { up: 1, measured: 2 },
            volume_up: Breadth { up: 0, measured: 0 },
            reference_asset_data: reference,
            rankings: Rankings {
                gainers: vec![row("BTC", "USDT", 31500.0, 0.05, 1200.0, 0.2)],
                losers: vec![row("ETH", "USDT", 1900.0, -0.05, 400.0, -0.2)],
                volume_gainers: vec![row("BTC", "USDT", 31500.0, 0.05, 1200.0, 0.2)],
                reference_gainers: vec![row("ETH", "BTC", 0.0603, 0.0123, 45.7, 0.0)],
                reference_losers: Vec::new(),
            },
        }
    }

    #[test]
    fn test_format_ratio_floors() {
        assert_eq!(format_ratio(Rate::Defined(0.05)), "5.00%");
        assert_eq!(format_ratio(Rate::Defined(0.051299)), "5.12%");
        assert_eq!(format_ratio(Rate::Defined(0.29)), "29.00%");
        assert_eq!(format_ratio(Rate::Defined(-0.05)), "-5.00%");
        assert_eq!(format_ratio(Rate::Defined(-0.05123)), "-5.13%");
        assert_eq!(format_ratio(Rate::Undefined), "n/a");
    }

    #[test]
    fn test_format_notional_groups_thousands() {
        assert_eq!(format_notional(0.99), "0");
        assert_eq!(format_notional(999.9), "999");
        assert_eq!(format_notional(1000.0), "1,000");
        assert_eq!(format_notional(1_234_567.89), "1,234,567");
        assert_eq!(format_notional(-1_234.5), "-1,235");
    }

    #[test]
    fn test_report_sections_in_order() {
        let reference = row("BTC", "USDT", 31500.0, 0.05, 1200.0, 0.2);
        let report = ReportFormatter::new("https://www.binance.com/en/trade/")
            .format(&summary(Some(reference)), &ReportWindow::from_open_time(1_714_640_400));

        let titles: Vec<&str> = report.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Summary",
                "Top gainers (USDT)",
                "Top gainers (BTC)",
                "Top volume gainers (USDT)",
                "Top losers (USDT)",
                "Top losers (BTC)",
            ]
        );

        let summary_section = report.section("Summary").unwrap();
        assert_eq!(summary_section.fields[0].value, "05/02 09:00 - 05/02 10:00");
        assert_eq!(summary_section.fields[2].value, "$1,234,567 (23.45%)");
        assert_eq!(summary_section.fields[3].value, "$31500 (5.00%)");
        assert_eq!(summary_section.fields[5].value, "50.00% (1/2)");
        assert_eq!(summary_section.fields[6].value, "n/a (0/0)");

        let gainers = report.section("Top gainers (BTC)").unwrap();
        assert_eq!(gainers.fields[0].name, "ETH");
        assert_eq!(gainers.fields[0].value, "1.23% (0.0603 BTC)");
        assert_eq!(
            gainers.fields[0].url.as_deref(),
            Some("https://www.binance.com/en/trade/ETH_BTC")
        );

        let volume = report.section("Top volume gainers (USDT)").unwrap();
        assert_eq!(volume.fields[0].value, "20.00% ($1,200)");
    }

    #[test]
    fn test_missing_reference_renders_placeholder() {
        let report = ReportFormatter::new("https://example.com")
            .format(&summary(None), &ReportWindow::from_open_time(0));
        let fields = &report.section("Summary").unwrap().fields;
        assert_eq!(fields[3].name, "BTC price");
        assert_eq!(fields[3].value, "unavailable");
        assert_eq!(fields[4].value, "unavailable");
    }

    #[test]
    fn test_plain_text_rendering() {
        let report = ReportFormatter::new("https://example.com")
            .format(&summary(None), &ReportWindow::from_open_time(0));
        let text = report.to_plain_text();
        assert!(text.starts_with("Summary\n  Window: 01/01 00:00 - 01/01 01:00\n"));
        assert!(text.contains("Top losers (BTC)\n  (none)\n"));
    }
}

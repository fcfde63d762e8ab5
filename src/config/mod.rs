use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Discord rejects embeds with more fields than this; one field per ranked row.
pub const MAX_RANKING_COUNT: usize = 25;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub universe: UniverseConfig,
    pub analysis: AnalysisConfig,
    pub database: DatabaseConfig,
    pub notification: NotificationConfig,
    pub cycle: CycleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Minimum spacing between two requests.
    pub request_delay_ms: u64,
    pub max_requests_per_minute: u32,
    pub max_concurrent_requests: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            api_key: None,
            timeout_secs: 10,
            max_retries: 3,
            request_delay_ms: 100,
            max_requests_per_minute: 1000,
            max_concurrent_requests: 4,
        }
    }
}

/// Which assets anchor the watchlist and the breadth metrics.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UniverseConfig {
    /// Market-wide reference asset, also the secondary quote currency.
    pub reference_asset: String,
    /// Quote currency the breadth metrics are computed in.
    pub numeraire: String,
    /// Used for base assets that have no numeraire market.
    pub fallback_numeraire: String,
    pub leveraged_suffixes: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            reference_asset: "BTC".to_string(),
            numeraire: "USDT".to_string(),
            fallback_numeraire: "BUSD".to_string(),
            leveraged_suffixes: vec!["UP".to_string(), "DOWN".to_string()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ranking_count: usize,
    /// Minimum current quote volume, in numeraire units, to be ranked.
    pub numeraire_volume_floor: f64,
    /// Minimum current quote volume, in reference-asset units, to be ranked.
    pub reference_volume_floor: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ranking_count: 10,
            numeraire_volume_floor: 100_000.0,
            reference_volume_floor: 2.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/market_digest".to_string(),
            max_connections: 5,
            table: "hourly_snapshots".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    pub enable_notifications: bool,
    pub discord_webhook_url: Option<String>,
    pub chart_url_base: String,
    pub telegram: Option<TelegramConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enable_notifications: true,
            discord_webhook_url: None,
            chart_url_base: "https://www.binance.com/en/trade".to_string(),
            telegram: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CycleConfig {
    /// Record a cycle even when some pairs failed to fetch.
    pub record_partial_sets: bool,
    /// Seed an empty history with the previous hour from the warehouse.
    pub backfill_from_store: bool,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            record_partial_sets: true,
            backfill_from_store: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&config_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    /// Secrets from the environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("EXCHANGE_API_KEY") {
            self.exchange.api_key = Some(key);
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(url) = env::var("DISCORD_WEBHOOK_URL") {
            self.notification.discord_webhook_url = Some(url);
        }
        if let (Ok(bot_token), Ok(chat_id)) =
            (env::var("TELEGRAM_BOT_TOKEN"), env::var("TELEGRAM_CHAT_ID"))
        {
            self.notification.telegram = Some(TelegramConfig { bot_token, chat_id });
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.analysis.ranking_count == 0 || self.analysis.ranking_count > MAX_RANKING_COUNT {
            return Err(Error::ConfigError(format!(
                "analysis.ranking_count must be between 1 and {}",
                MAX_RANKING_COUNT
            )));
        }
        if self.exchange.max_concurrent_requests == 0 {
            return Err(Error::ConfigError(
                "exchange.max_concurrent_requests must be at least 1".into(),
            ));
        }
        if self.analysis.numeraire_volume_floor < 0.0 || self.analysis.reference_volume_floor < 0.0
        {
            return Err(Error::ConfigError("volume floors must not be negative".into()));
        }
        let universe = &self.universe;
        if universe.reference_asset.is_empty() || universe.numeraire.is_empty() {
            return Err(Error::ConfigError(
                "universe.reference_asset and universe.numeraire are required".into(),
            ));
        }
        if universe.reference_asset == universe.numeraire {
            return Err(Error::ConfigError(
                "universe.reference_asset and universe.numeraire must differ".into(),
            ));
        }
        if !self.database.table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::ConfigError(format!(
                "database.table '{}' must be a plain identifier",
                self.database.table
            )));
        }
        Ok(())
    }
}

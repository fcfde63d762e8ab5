use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use market_digest::api::{BinanceClient, MarketDataProvider};
use market_digest::cli::Cli;
use market_digest::config::Config;
use market_digest::logging;
use market_digest::notify::{DiscordNotifier, Notifier, TelegramNotifier};
use market_digest::pipeline::{CycleStatus, Pipeline};
use market_digest::store::{MemoryStore, PostgresStore, SnapshotStore};

fn build_notifiers(config: &Config) -> Result<Vec<Box<dyn Notifier>>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
    let timeout = Duration::from_secs(config.exchange.timeout_secs);

    if let Some(url) = config.notification.discord_webhook_url.as_deref().filter(|u| !u.is_empty()) {
        notifiers.push(Box::new(DiscordNotifier::new(url, timeout)?));
    }
    if let Some(telegram) = &config.notification.telegram {
        notifiers.push(Box::new(TelegramNotifier::new(telegram)?));
    }
    if notifiers.is_empty() && config.notification.enable_notifications {
        warn!("Notifications enabled but no Discord webhook or Telegram chat configured");
    }
    Ok(notifiers)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

    match &config.logging.file {
        Some(file) => logging::init_file(Path::new(file), cli.debug)?,
        None => logging::init_env(cli.debug),
    }
    info!("Configuration loaded from {:?}", cli.config);

    let provider: Arc<dyn MarketDataProvider> = Arc::new(BinanceClient::new(&config.exchange)?);

    let (store, notifiers): (Arc<dyn SnapshotStore>, Vec<Box<dyn Notifier>>) = if cli.dry_run {
        info!("Dry run: snapshots stay in memory, report goes to stdout");
        (Arc::new(MemoryStore::new()), Vec::new())
    } else {
        let store = PostgresStore::connect(&config.database)
            .await
            .context("failed to connect to the snapshot warehouse")?;
        (Arc::new(store), build_notifiers(&config)?)
    };

    let mut pipeline = Pipeline::new(&config, provider, store, notifiers);

    if cli.watch {
        info!("Watching, one cycle per hour");
        pipeline.run_hourly().await?;
        return Ok(());
    }

    let at = cli.at.unwrap_or_else(Utc::now);
    if cli.dry_run {
        // Nothing is stored yet, so prime the history with the hour before.
        pipeline.run_cycle(at - chrono::Duration::hours(1)).await?;
    }
    let cycle = pipeline.run_cycle(at).await?;
    info!(
        "Cycle {} finished: {:?}, {} of {} pairs fetched",
        cycle.boundary, cycle.status, cycle.fetched, cycle.watchlist_len
    );
    if !cycle.failed_pairs.is_empty() {
        warn!("{} pairs skipped this cycle", cycle.failed_pairs.len());
    }

    if cli.dry_run {
        match (&cycle.status, &cycle.report) {
            (CycleStatus::Reported, Some(report)) => print!("{}", report.to_plain_text()),
            (status, _) => println!("No report: {:?}", status),
        }
    }
    Ok(())
}

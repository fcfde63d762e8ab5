use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Hour boundary to process (RFC 3339), defaults to the current hour
    #[arg(long, value_parser = parse_time)]
    pub at: Option<DateTime<Utc>>,

    /// Keep running, one cycle per hour
    #[arg(short, long, conflicts_with = "at")]
    pub watch: bool,

    /// Keep snapshots in memory and print the report instead of sending it
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::Snapshot;
use crate::store::SnapshotStore;

const COLUMNS: &str = "base_asset, quote_asset, open_time, close_time, open_price, high, low, \
     close_price, number_of_trades, volume, quote_asset_volume, \
     taker_buy_base_asset_volume, taker_buy_quote_asset_volume";

// 13 binds per row, well under the 65535 parameter ceiling.
const INSERT_CHUNK: usize = 1000;

pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        let store = Self::with_pool(pool, &config.table);
        store.ensure_schema().await?;
        info!("Connected to snapshot warehouse, table {}", store.table);
        Ok(store)
    }

    /// `table` must already be a validated identifier (see `Config::validate`).
    pub fn with_pool(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
        }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
CREATE TABLE IF NOT EXISTS {table} (
  base_asset TEXT NOT NULL,
  quote_asset TEXT NOT NULL,
  open_time TIMESTAMPTZ NOT NULL,
  close_time TIMESTAMPTZ NOT NULL,
  open_price DOUBLE PRECISION NOT NULL,
  high DOUBLE PRECISION NOT NULL,
  low DOUBLE PRECISION NOT NULL,
  close_price DOUBLE PRECISION NOT NULL,
  number_of_trades BIGINT NOT NULL,
  volume DOUBLE PRECISION NOT NULL,
  quote_asset_volume DOUBLE PRECISION NOT NULL,
  taker_buy_base_asset_volume DOUBLE PRECISION NOT NULL,
  taker_buy_quote_asset_volume DOUBLE PRECISION NOT NULL,
  PRIMARY KEY (base_asset, quote_asset, open_time)
);
"#,
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_open_time ON {table}(open_time);",
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

struct SnapshotRow<'a> {
    snapshot: &'a Snapshot,
    open_time: DateTime<Utc>,
    close_time: DateTime<Utc>,
    number_of_trades: i64,
}

impl<'a> SnapshotRow<'a> {
    fn encode(snapshot: &'a Snapshot) -> Result<Self> {
        let number_of_trades = i64::try_from(snapshot.number_of_trades).map_err(|_| {
            Error::PersistenceFailure(format!(
                "{}: trade count {} out of range",
                snapshot.pair(),
                snapshot.number_of_trades
            ))
        })?;
        Ok(Self {
            snapshot,
            open_time: to_datetime(snapshot.open_time)?,
            close_time: to_datetime(snapshot.close_time)?,
            number_of_trades,
        })
    }
}

fn to_datetime(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::PersistenceFailure(format!("timestamp {} out of range", secs)))
}

fn decode(row: &PgRow) -> Result<Snapshot> {
    let open_time: DateTime<Utc> = row.try_get("open_time")?;
    let close_time: DateTime<Utc> = row.try_get("close_time")?;
    let number_of_trades: i64 = row.try_get("number_of_trades")?;

    Ok(Snapshot {
        base_asset: row.try_get("base_asset")?,
        quote_asset: row.try_get("quote_asset")?,
        open_time: open_time.timestamp(),
        close_time: close_time.timestamp(),
        open_price: row.try_get("open_price")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close_price: row.try_get("close_price")?,
        number_of_trades: u64::try_from(number_of_trades).map_err(|_| {
            Error::DatabaseError(format!("negative trade count {}", number_of_trades))
        })?,
        volume: row.try_get("volume")?,
        quote_asset_volume: row.try_get("quote_asset_volume")?,
        taker_buy_base_asset_volume: row.try_get("taker_buy_base_asset_volume")?,
        taker_buy_quote_asset_volume: row.try_get("taker_buy_quote_asset_volume")?,
    })
}

#[async_trait]
impl SnapshotStore for PostgresStore {
    async fn save(&self, snapshots: &[Snapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }
        let rows = snapshots
            .iter()
            .map(SnapshotRow::encode)
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::PersistenceFailure(e.to_string()))?;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", self.table, COLUMNS));
            builder.push_values(chunk, |mut b, row| {
                let s = row.snapshot;
                b.push_bind(s.base_asset.as_str())
                    .push_bind(s.quote_asset.as_str())
                    .push_bind(row.open_time)
                    .push_bind(row.close_time)
                    .push_bind(s.open_price)
                    .push_bind(s.high)
                    .push_bind(s.low)
                    .push_bind(s.close_price)
                    .push_bind(row.number_of_trades)
                    .push_bind(s.volume)
                    .push_bind(s.quote_asset_volume)
                    .push_bind(s.taker_buy_base_asset_volume)
                    .push_bind(s.taker_buy_quote_asset_volume);
            });
            builder.push(" ON CONFLICT (base_asset, quote_asset, open_time) DO NOTHING");

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::PersistenceFailure(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::PersistenceFailure(e.to_string()))?;
        debug!("Saved {} snapshots to {}", snapshots.len(), self.table);
        Ok(())
    }

    async fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Snapshot>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE open_time >= $1 AND open_time < $2 ORDER BY open_time",
            COLUMNS, self.table
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode).collect()
    }
}

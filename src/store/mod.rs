//! Warehouse of recorded snapshots.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Snapshot;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Append-only snapshot storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persists a batch. Any rejected row fails the whole call with `PersistenceFailure`.
    async fn save(&self, snapshots: &[Snapshot]) -> Result<()>;

    /// Snapshots whose open time falls in `[start, end)`.
    async fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Snapshot>>;
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::Snapshot;
use crate::store::SnapshotStore;

/// Process-local store, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, snapshots: &[Snapshot]) -> Result<()> {
        self.rows.lock().await.extend_from_slice(snapshots);
        Ok(())
    }

    async fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Snapshot>> {
        let (start, end) = (start.timestamp(), end.timestamp());
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|s| s.open_time >= start && s.open_time < end)
            .cloned()
            .collect())
    }
}

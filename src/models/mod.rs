pub mod market;

pub use market::{truncate_to_hour, Pair, Snapshot, SnapshotSet, HOUR_SECS};

use log::debug;
use std::collections::VecDeque;

use crate::models::{SnapshotSet, HOUR_SECS};

const RETAINED_CYCLES: usize = 2;

/// The last two recorded snapshot sets, newest first.
#[derive(Debug, Default)]
pub struct SnapshotHistory {
    sets: VecDeque<SnapshotSet>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self {
            sets: VecDeque::with_capacity(RETAINED_CYCLES + 1),
        }
    }

    pub fn record(&mut self, set: SnapshotSet) {
        debug!("Recording snapshot set for {} ({} pairs)", set.open_time(), set.len());
        self.sets.push_front(set);
        self.sets.truncate(RETAINED_CYCLES);
    }

    /// Places `set` behind the current one, replacing any older set there.
    /// Used to seed a cold or gapped history from storage.
    pub fn backfill(&mut self, set: SnapshotSet) {
        if self.sets.is_empty() {
            return;
        }
        self.sets.truncate(1);
        self.sets.push_back(set);
    }

    /// True when the previous set opened exactly one hour before the current one.
    pub fn is_contiguous(&self) -> bool {
        match (self.current(), self.previous()) {
            (Some(current), Some(previous)) => {
                current.open_time() - previous.open_time() == HOUR_SECS
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&SnapshotSet> {
        self.sets.front()
    }

    pub fn previous(&self) -> Option<&SnapshotSet> {
        self.sets.get(1)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

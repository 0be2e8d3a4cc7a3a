//! Telemetry Snapshot Store
//!
//! Single writer for the snapshot and its history rings. Merge and derive
//! happen in one call, so readers never observe a half-applied update.

use std::collections::BTreeMap;

use tracing::debug;

use crate::protocol::SnapshotPatch;

use super::history::{HistoryField, HistoryRing, Sample, DEFAULT_HISTORY_CAPACITY};
use super::snapshot::TelemetrySnapshot;

pub struct TelemetryStore {
    snapshot: TelemetrySnapshot,
    history: BTreeMap<HistoryField, HistoryRing>,
    capacity: usize,
    /// Bumped on every merge that changed the snapshot and on reset.
    revision: u64,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TelemetryStore {
    pub fn new(history_capacity: usize) -> Self {
        let mut store = Self {
            snapshot: TelemetrySnapshot::default(),
            history: BTreeMap::new(),
            capacity: history_capacity,
            revision: 0,
        };
        store.reset();
        store
    }

    /// Applies a partial update. Returns `true` if any value changed.
    pub fn merge(&mut self, patch: &SnapshotPatch) -> bool {
        let before = self.snapshot.clone();
        self.snapshot.merge(patch);
        let changed = self.snapshot != before;
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Appends the current value of each tracked field to its ring.
    pub fn record_history(&mut self, timestamp: i64) {
        for field in HistoryField::ALL {
            let value = field.read(&self.snapshot);
            self.history
                .entry(field)
                .or_insert_with(|| HistoryRing::new(self.capacity))
                .push(Sample { timestamp, value });
        }
    }

    /// Restores initial values and empties every ring. Idempotent.
    pub fn reset(&mut self) {
        self.snapshot = TelemetrySnapshot::default();
        self.snapshot.recompute_derived();
        self.history = HistoryField::ALL
            .into_iter()
            .map(|field| (field, HistoryRing::new(self.capacity)))
            .collect();
        self.revision += 1;
        debug!(capacity = self.capacity, "Telemetry store reset");
    }

    /// Owned copy of the current snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot.clone()
    }

    /// Borrowed view for in-crate readers that must not pay for a clone.
    pub(crate) fn current(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// Owned, oldest-first copy of one field's history.
    pub fn history(&self, field: HistoryField) -> Vec<Sample> {
        self.history
            .get(&field)
            .map(HistoryRing::to_vec)
            .unwrap_or_default()
    }

    pub fn history_len(&self, field: HistoryField) -> usize {
        self.history.get(&field).map(HistoryRing::len).unwrap_or(0)
    }

    pub fn history_capacity(&self) -> usize {
        self.capacity
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

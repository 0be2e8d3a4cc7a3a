//! Bounded rolling history for a fixed set of numeric fields.

use std::collections::VecDeque;

use serde::Serialize;

use super::snapshot::TelemetrySnapshot;

/// Default ring length: about five minutes at 1 Hz.
pub const DEFAULT_HISTORY_CAPACITY: usize = 300;

/// One timestamped value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

/// Snapshot fields that keep a history ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryField {
    Speed,
    Rpm,
    EngineTemp,
    FuelLevel,
    AverageTireTemp,
}

impl HistoryField {
    pub const ALL: [HistoryField; 5] = [
        HistoryField::Speed,
        HistoryField::Rpm,
        HistoryField::EngineTemp,
        HistoryField::FuelLevel,
        HistoryField::AverageTireTemp,
    ];

    pub fn read(self, snapshot: &TelemetrySnapshot) -> f64 {
        match self {
            HistoryField::Speed => snapshot.speed,
            HistoryField::Rpm => snapshot.rpm,
            HistoryField::EngineTemp => snapshot.engine_temp,
            HistoryField::FuelLevel => snapshot.fuel_level,
            HistoryField::AverageTireTemp => snapshot.average_tire_temp,
        }
    }
}

impl std::fmt::Display for HistoryField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryField::Speed => write!(f, "speed"),
            HistoryField::Rpm => write!(f, "rpm"),
            HistoryField::EngineTemp => write!(f, "engineTemp"),
            HistoryField::FuelLevel => write!(f, "fuelLevel"),
            HistoryField::AverageTireTemp => write!(f, "averageTireTemp"),
        }
    }
}

/// Fixed-capacity FIFO of samples. Pushing into a full ring evicts the oldest.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Oldest-first copy of the samples.
    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
}

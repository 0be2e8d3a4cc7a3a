//! # Telemetry
//!
//! Current-state snapshot, derived values and rolling history.

pub mod history;
pub mod snapshot;
pub mod store;

pub use history::{HistoryField, HistoryRing, Sample, DEFAULT_HISTORY_CAPACITY};
pub use snapshot::{TelemetrySnapshot, PIT_WINDOW_FUEL_PCT, PIT_WINDOW_LAPS};
pub use store::TelemetryStore;

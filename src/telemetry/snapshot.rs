//! Current-value record of every tracked telemetry field.

use serde::Serialize;

use crate::protocol::{CornerPatch, SnapshotPatch};
use crate::types::Corners;

/// Below this fuel percentage the pit window is open.
pub const PIT_WINDOW_FUEL_PCT: f64 = 30.0;
/// Below this many laps of fuel the pit window is open.
pub const PIT_WINDOW_LAPS: f64 = 3.0;

/// Latest known value of every tracked field plus values derived from them.
///
/// Initial values are zeros and empty strings. A `fuel_capacity` of zero
/// means the capacity has not been reported yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub speed: f64,
    pub gear: i32,
    pub rpm: f64,
    pub engine_temp: f64,

    pub fuel_level: f64,
    pub fuel_capacity: f64,
    pub fuel_usage_per_lap: f64,

    pub tire_temps: Corners<f64>,
    pub tire_pressures: Corners<f64>,
    pub tire_wear: Corners<f64>,

    pub lap: u32,
    pub total_laps: u32,
    pub current_lap_time: f64,
    pub last_lap_time: f64,
    pub best_lap_time: f64,
    pub delta: f64,

    pub session_type: String,
    pub track_name: String,
    pub session_time_remaining: f64,
    pub flag: String,

    pub position: u32,
    pub total_cars: u32,
    pub gap_ahead: f64,
    pub gap_behind: f64,

    // Derived
    pub fuel_percentage: Option<f64>,
    pub estimated_laps_remaining: Option<f64>,
    pub average_tire_temp: f64,
    pub pit_window_open: bool,
}

macro_rules! merge_fields {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$patch.$field {
                $target.$field = value.clone();
            }
        )+
    };
}

impl TelemetrySnapshot {
    /// Overwrites every field the patch names, then recomputes derived values.
    pub fn merge(&mut self, patch: &SnapshotPatch) {
        merge_fields!(self, patch;
            speed, gear, rpm, engine_temp,
            fuel_level, fuel_capacity, fuel_usage_per_lap,
            lap, total_laps, current_lap_time, last_lap_time, best_lap_time, delta,
            session_type, track_name, session_time_remaining, flag,
            position, total_cars, gap_ahead, gap_behind,
        );
        if let Some(corners) = &patch.tire_temps {
            merge_corners(&mut self.tire_temps, corners);
        }
        if let Some(corners) = &patch.tire_pressures {
            merge_corners(&mut self.tire_pressures, corners);
        }
        if let Some(corners) = &patch.tire_wear {
            merge_corners(&mut self.tire_wear, corners);
        }
        self.recompute_derived();
    }

    /// Derived values depend on the fields above and nothing else.
    pub fn recompute_derived(&mut self) {
        self.fuel_percentage = if self.fuel_capacity > 0.0 {
            Some(self.fuel_level / self.fuel_capacity * 100.0)
        } else {
            None
        };

        self.estimated_laps_remaining = if self.fuel_usage_per_lap > 0.0 {
            Some(self.fuel_level / self.fuel_usage_per_lap)
        } else {
            None
        };

        self.average_tire_temp = self.tire_temps.average();

        let low_fuel = self
            .fuel_percentage
            .map(|pct| pct < PIT_WINDOW_FUEL_PCT)
            .unwrap_or(false);
        let few_laps = self
            .estimated_laps_remaining
            .map(|laps| laps < PIT_WINDOW_LAPS)
            .unwrap_or(false);
        self.pit_window_open = low_fuel || few_laps;
    }

    /// Laps left in the race, if the total is known.
    pub fn laps_to_go(&self) -> Option<u32> {
        (self.total_laps > 0).then(|| self.total_laps.saturating_sub(self.lap))
    }
}

fn merge_corners(target: &mut Corners<f64>, patch: &CornerPatch) {
    if let Some(v) = patch.fl {
        target.fl = v;
    }
    if let Some(v) = patch.fr {
        target.fr = v;
    }
    if let Some(v) = patch.rl {
        target.rl = v;
    }
    if let Some(v) = patch.rr {
        target.rr = v;
    }
}

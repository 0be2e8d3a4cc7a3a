//! Strategy advisories derived from the telemetry snapshot.
//!
//! Each [`StrategyRule`] looks at the snapshot on its own and contributes at
//! most one [`Suggestion`]. The [`StrategyAdvisor`] runs them in order and
//! publishes the ranked result.

pub mod advisor;
pub mod rules;

pub use advisor::StrategyAdvisor;
pub use rules::{
    default_rules, DefendPositionRule, EngineOverheatRule, FuelCriticalRule, FuelUsageHighRule,
    OvertakeOpportunityRule, TireOverheatRule,
};

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySnapshot;
pub use crate::types::{Category, Priority, Suggestion};

/// Threshold rule contract. Rules read the snapshot and never mutate it.
pub trait StrategyRule {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;

    /// Returns a suggestion when the rule's condition holds.
    fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Option<Suggestion>;
}

/// Tunable limits for the built-in rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvisorThresholds {
    /// Fuel percentage below which fuel rules engage
    pub fuel_warning_pct: f64,
    /// Laps of fuel below which the fuel warning becomes critical
    pub fuel_critical_laps: f64,
    /// Target consumption per lap
    pub target_fuel_usage: f64,
    /// Tire temperature (°C) considered overheating
    pub tire_overheat_temp: f64,
    /// Gap to the car ahead (s) that opens an overtake
    pub overtake_gap: f64,
    /// Gap to the car behind (s) that requires defending
    pub defend_gap: f64,
    /// Engine temperature (°C) considered overheating
    pub engine_overheat_temp: f64,
    /// Engine temperature (°C) considered critical
    pub engine_critical_temp: f64,
}

impl Default for AdvisorThresholds {
    fn default() -> Self {
        Self {
            fuel_warning_pct: 30.0,
            fuel_critical_laps: 3.0,
            target_fuel_usage: 3.0,
            tire_overheat_temp: 100.0,
            overtake_gap: 1.0,
            defend_gap: 0.5,
            engine_overheat_temp: 110.0,
            engine_critical_temp: 120.0,
        }
    }
}

//! Built-in threshold rules.
//!
//! Order of [`default_rules`] is the tie-break order for suggestions of equal
//! priority.

use crate::telemetry::TelemetrySnapshot;

use super::{AdvisorThresholds, Category, Priority, StrategyRule, Suggestion};

/// Default rule set in evaluation order.
pub fn default_rules(thresholds: &AdvisorThresholds) -> Vec<Box<dyn StrategyRule>> {
    vec![
        Box::new(FuelCriticalRule::new(
            thresholds.fuel_warning_pct,
            thresholds.fuel_critical_laps,
        )),
        Box::new(FuelUsageHighRule::new(
            thresholds.fuel_warning_pct,
            thresholds.target_fuel_usage,
        )),
        Box::new(TireOverheatRule::new(thresholds.tire_overheat_temp)),
        Box::new(OvertakeOpportunityRule::new(thresholds.overtake_gap)),
        Box::new(DefendPositionRule::new(thresholds.defend_gap)),
        Box::new(EngineOverheatRule::new(
            thresholds.engine_overheat_temp,
            thresholds.engine_critical_temp,
        )),
    ]
}

/// Fuel percentage if known and below the warning level.
fn fuel_below(snapshot: &TelemetrySnapshot, warning_pct: f64) -> Option<f64> {
    snapshot.fuel_percentage.filter(|pct| *pct < warning_pct)
}

/// Pit window is open on fuel; critical when only a few laps remain.
pub struct FuelCriticalRule {
    warning_pct: f64,
    critical_laps: f64,
}

impl FuelCriticalRule {
    pub fn new(warning_pct: f64, critical_laps: f64) -> Self {
        Self {
            warning_pct,
            critical_laps,
        }
    }
}

impl StrategyRule for FuelCriticalRule {
    fn name(&self) -> &'static str {
        "fuel-critical"
    }

    fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Option<Suggestion> {
        let pct = fuel_below(snapshot, self.warning_pct)?;
        let laps = snapshot.estimated_laps_remaining;

        match laps {
            Some(laps) if laps < self.critical_laps => Some(Suggestion::new(
                Priority::Critical,
                Category::Fuel,
                format!("Fuel critical at {pct:.1}% (~{laps:.1} laps left): box this lap"),
                "Avoid running dry",
            )),
            Some(laps) => Some(Suggestion::new(
                Priority::High,
                Category::Fuel,
                format!("Fuel at {pct:.1}% (~{laps:.1} laps left): pit window open"),
                "Plan stop without losing track position",
            )),
            None => Some(Suggestion::new(
                Priority::High,
                Category::Fuel,
                format!("Fuel at {pct:.1}%: pit window open"),
                "Plan stop without losing track position",
            )),
        }
    }
}

/// Consumption above target while the tank is already low.
pub struct FuelUsageHighRule {
    warning_pct: f64,
    target_usage: f64,
}

impl FuelUsageHighRule {
    pub fn new(warning_pct: f64, target_usage: f64) -> Self {
        Self {
            warning_pct,
            target_usage,
        }
    }
}

impl StrategyRule for FuelUsageHighRule {
    fn name(&self) -> &'static str {
        "fuel-usage-high"
    }

    fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Option<Suggestion> {
        fuel_below(snapshot, self.warning_pct)?;
        let usage = snapshot.fuel_usage_per_lap;
        if self.target_usage <= 0.0 || usage <= self.target_usage {
            return None;
        }

        // Extra laps the remaining fuel would cover at target consumption
        let gain = snapshot.fuel_level / self.target_usage - snapshot.fuel_level / usage;
        Some(Suggestion::new(
            Priority::Medium,
            Category::Fuel,
            format!(
                "Fuel usage {usage:.2}/lap above {:.2} target: lift and coast",
                self.target_usage
            ),
            format!("+{gain:.1} laps"),
        ))
    }
}

/// Any corner above the overheat threshold.
pub struct TireOverheatRule {
    max_temp: f64,
}

impl TireOverheatRule {
    pub fn new(max_temp: f64) -> Self {
        Self { max_temp }
    }
}

impl StrategyRule for TireOverheatRule {
    fn name(&self) -> &'static str {
        "tire-overheat"
    }

    fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Option<Suggestion> {
        let (corner, temp) = snapshot.tire_temps.max_labelled();
        if temp <= self.max_temp {
            return None;
        }
        Some(Suggestion::new(
            Priority::High,
            Category::Tires,
            format!("{corner} tire overheating at {temp:.0}°C: manage slip in high-speed corners"),
            "Preserve grip for the stint",
        ))
    }
}

/// Car ahead within striking distance.
pub struct OvertakeOpportunityRule {
    max_gap: f64,
}

impl OvertakeOpportunityRule {
    pub fn new(max_gap: f64) -> Self {
        Self { max_gap }
    }
}

impl StrategyRule for OvertakeOpportunityRule {
    fn name(&self) -> &'static str {
        "overtake-opportunity"
    }

    fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Option<Suggestion> {
        let gap = snapshot.gap_ahead;
        // P1 has nobody to pass; a zero gap means "not reported"
        if snapshot.position == 1 || gap <= 0.0 || gap >= self.max_gap {
            return None;
        }
        Some(Suggestion::new(
            Priority::Medium,
            Category::Position,
            format!("Car ahead within {gap:.1}s: overtake opportunity"),
            "+1 position",
        ))
    }
}

/// Car behind close enough to attack.
pub struct DefendPositionRule {
    max_gap: f64,
}

impl DefendPositionRule {
    pub fn new(max_gap: f64) -> Self {
        Self { max_gap }
    }
}

impl StrategyRule for DefendPositionRule {
    fn name(&self) -> &'static str {
        "defend-position"
    }

    fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Option<Suggestion> {
        let gap = snapshot.gap_behind;
        if gap <= 0.0 || gap >= self.max_gap {
            return None;
        }
        Some(Suggestion::new(
            Priority::Medium,
            Category::Position,
            format!("Car behind within {gap:.1}s: defend the inside line"),
            "Hold position",
        ))
    }
}

pub struct EngineOverheatRule {
    warning_temp: f64,
    critical_temp: f64,
}

impl EngineOverheatRule {
    pub fn new(warning_temp: f64, critical_temp: f64) -> Self {
        Self {
            warning_temp,
            critical_temp,
        }
    }
}

impl StrategyRule for EngineOverheatRule {
    fn name(&self) -> &'static str {
        "engine-overheat"
    }

    fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Option<Suggestion> {
        let temp = snapshot.engine_temp;
        if temp <= self.warning_temp {
            return None;
        }
        let priority = if temp > self.critical_temp {
            Priority::Critical
        } else {
            Priority::High
        };
        Some(Suggestion::new(
            priority,
            Category::Engine,
            format!("Engine temperature {temp:.0}°C: short-shift and get out of the tow"),
            "Avoid engine failure",
        ))
    }
}

//! Common Types Module
//!
//! Shared types used across the codebase to avoid circular dependencies.

use serde::{Deserialize, Serialize};

/// Urgency of a strategy suggestion.
///
/// Declaration order is the presentation order: `Critical` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Area of the car or race a suggestion is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fuel,
    Tires,
    Position,
    Engine,
    Strategy,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Fuel => write!(f, "fuel"),
            Category::Tires => write!(f, "tires"),
            Category::Position => write!(f, "position"),
            Category::Engine => write!(f, "engine"),
            Category::Strategy => write!(f, "strategy"),
        }
    }
}

/// A prioritized, human-readable strategy recommendation.
///
/// Suggestions are immutable once built; the advisor replaces the whole list
/// on every recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub priority: Priority,
    pub text: String,
    #[serde(default)]
    pub estimated_gain: String,
    pub category: Category,
}

impl Suggestion {
    pub fn new(
        priority: Priority,
        category: Category,
        text: impl Into<String>,
        estimated_gain: impl Into<String>,
    ) -> Self {
        Self {
            priority,
            text: text.into(),
            estimated_gain: estimated_gain.into(),
            category,
        }
    }
}

/// One value per wheel: front-left, front-right, rear-left, rear-right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Corners<T> {
    pub fl: T,
    pub fr: T,
    pub rl: T,
    pub rr: T,
}

impl<T: Copy> Corners<T> {
    /// Values paired with a display label, in fl/fr/rl/rr order.
    pub fn labelled(&self) -> [(&'static str, T); 4] {
        [
            ("Front-left", self.fl),
            ("Front-right", self.fr),
            ("Rear-left", self.rl),
            ("Rear-right", self.rr),
        ]
    }
}

impl Corners<f64> {
    pub fn average(&self) -> f64 {
        (self.fl + self.fr + self.rl + self.rr) / 4.0
    }

    /// Hottest (largest) corner with its label.
    pub fn max_labelled(&self) -> (&'static str, f64) {
        self.labelled()
            .into_iter()
            .fold(("Front-left", f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_orders_most_urgent_first() {
        let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn test_corner_average_and_max() {
        let temps = Corners { fl: 90.0, fr: 104.0, rl: 86.0, rr: 92.0 };
        assert!((temps.average() - 93.0).abs() < f64::EPSILON);
        assert_eq!(temps.max_labelled(), ("Front-right", 104.0));
    }

    #[test]
    fn test_suggestion_wire_shape() {
        let suggestion: Suggestion = serde_json::from_value(serde_json::json!({
            "priority": "high",
            "text": "Box this lap",
            "estimatedGain": "+2.1s",
            "category": "strategy"
        }))
        .unwrap();
        assert_eq!(suggestion.priority, Priority::High);
        assert_eq!(suggestion.category, Category::Strategy);
        assert_eq!(suggestion.estimated_gain, "+2.1s");
    }
}

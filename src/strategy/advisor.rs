//! Strategy Advisor
//!
//! Runs the rule set against the snapshot and keeps the ranked list:
//! - Local rule output first, server-pushed suggestions after
//! - Stable sort by priority (most urgent first)
//! - Duplicate texts collapsed to their first occurrence

use std::collections::HashSet;

use tracing::debug;

use crate::telemetry::TelemetrySnapshot;

use super::rules::default_rules;
use super::{AdvisorThresholds, StrategyRule, Suggestion};

pub struct StrategyAdvisor {
    rules: Vec<Box<dyn StrategyRule>>,
    /// Latest suggestions received in a strategy frame
    remote: Vec<Suggestion>,
    suggestions: Vec<Suggestion>,
}

impl Default for StrategyAdvisor {
    fn default() -> Self {
        Self::new(&AdvisorThresholds::default())
    }
}

impl StrategyAdvisor {
    pub fn new(thresholds: &AdvisorThresholds) -> Self {
        Self::with_rules(default_rules(thresholds))
    }

    /// Advisor with a custom rule set, evaluated in the given order.
    pub fn with_rules(rules: Vec<Box<dyn StrategyRule>>) -> Self {
        Self {
            rules,
            remote: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn add_rule(&mut self, rule: Box<dyn StrategyRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Replaces the server-provided suggestions. Takes effect on the next
    /// [`recompute`](Self::recompute).
    pub fn set_remote(&mut self, suggestions: Vec<Suggestion>) {
        self.remote = suggestions;
    }

    /// Re-evaluates every rule and replaces the list wholesale.
    ///
    /// Returns `true` when the new list differs from the previous one.
    pub fn recompute(&mut self, snapshot: &TelemetrySnapshot) -> bool {
        let mut next: Vec<Suggestion> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let suggestion = rule.evaluate(snapshot);
                if let Some(s) = &suggestion {
                    debug!(rule = rule.name(), priority = %s.priority, "Rule fired");
                }
                suggestion
            })
            .collect();
        next.extend(self.remote.iter().cloned());

        // sort_by_key is stable, so equal priorities keep rule order
        next.sort_by_key(|s| s.priority);
        let mut seen = HashSet::new();
        next.retain(|s| seen.insert(s.text.clone()));

        let changed = next != self.suggestions;
        self.suggestions = next;
        changed
    }

    /// Owned copy of the current list.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.suggestions.clone()
    }

    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    pub fn clear(&mut self) {
        self.remote.clear();
        self.suggestions.clear();
    }
}

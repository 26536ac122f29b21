//! Rule evaluation against a scan result.

use crate::rule::RuleSet;
use serde_json::Value;
use tracing::debug;
use vigil_core::{ScanResult, Violation};

/// Evaluates rule sets against scan results.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    /// Create an engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// One violation per satisfied rule, in rule-set order.
    ///
    /// A rule whose predicate fails to evaluate is treated as unsatisfied.
    #[must_use]
    pub fn evaluate(&self, result: &ScanResult, rules: &RuleSet) -> Vec<Violation> {
        let data = match serde_json::to_value(result) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "scan result not serializable; no rules evaluated");
                return Vec::new();
            }
        };
        self.evaluate_value(&data, rules)
    }

    /// Evaluate rules against an already-serialized result.
    #[must_use]
    pub fn evaluate_value(&self, data: &Value, rules: &RuleSet) -> Vec<Violation> {
        rules
            .iter()
            .filter(|rule| match rule.predicate.evaluate(data) {
                Ok(satisfied) => satisfied,
                Err(e) => {
                    debug!(rule_id = %rule.id, error = %e, "rule evaluation failed");
                    false
                }
            })
            .map(|rule| Violation::new(&rule.id, &rule.description, rule.severity))
            .collect()
    }
}

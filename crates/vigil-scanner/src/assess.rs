//! Post-scan assessment: rules, script anomalies and the compliance score.

use crate::anomaly::AnomalyDetector;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use vigil_browser::location::network_location;
use vigil_core::ScanResult;
use vigil_rules::{RuleEngine, RuleLoader};

/// A scan result with every violation applied, and its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Scan result including rule and anomaly violations
    pub result: ScanResult,
    /// Compliance score over all violations
    pub score: u32,
}

/// Applies rule packs and the anomaly detector to finished scans.
pub struct Assessor {
    rules_dir: PathBuf,
    engine: RuleEngine,
    detector: AnomalyDetector,
}

impl Assessor {
    /// Assessor loading rule packs from `rules_dir` on every call.
    #[must_use]
    pub fn new(rules_dir: impl Into<PathBuf>, detector: AnomalyDetector) -> Self {
        Self {
            rules_dir: rules_dir.into(),
            engine: RuleEngine::new(),
            detector,
        }
    }

    /// Evaluate rules and script anomalies, then score.
    ///
    /// Rule packs are reloaded for each assessment.
    pub async fn assess(&self, result: ScanResult) -> Result<Assessment> {
        let rules = RuleLoader::new(&self.rules_dir)?.load()?;
        let rule_violations = self.engine.evaluate(&result, &rules);

        let domain = network_location(&result.url).unwrap_or_default();
        let anomalies = self.detector.detect(&domain, &result.scripts).await?;

        info!(
            url = %result.url,
            rule_violations = rule_violations.len(),
            anomalies = anomalies.len(),
            "assessed scan"
        );

        let result = result
            .with_violations(rule_violations)
            .with_violations(anomalies);
        let score = result.score();
        Ok(Assessment { result, score })
    }
}

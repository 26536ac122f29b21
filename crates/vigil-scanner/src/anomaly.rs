//! Historical anomaly detection over script hashes.

use crate::error::Result;
use crate::history::ScriptHistory;
use std::collections::HashSet;
use std::sync::Arc;
use vigil_core::{ScriptObservation, Severity, Violation};

/// Default occurrence share below which a script is flagged.
pub const DEFAULT_RARE_SCRIPT_SHARE: f64 = 0.01;

/// Flags scripts that are rare or new in a domain's own history.
pub struct AnomalyDetector {
    history: Arc<dyn ScriptHistory>,
    threshold: f64,
}

impl AnomalyDetector {
    /// Detector reading from `history` with the default threshold.
    #[must_use]
    pub fn new(history: Arc<dyn ScriptHistory>) -> Self {
        Self {
            history,
            threshold: DEFAULT_RARE_SCRIPT_SHARE,
        }
    }

    /// Override the share threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// One `medium` violation per distinct current hash whose share of the
    /// domain's history is strictly below the threshold.
    ///
    /// A domain with no history yields no violations.
    #[allow(clippy::cast_precision_loss)]
    pub async fn detect(
        &self,
        domain: &str,
        observations: &[ScriptObservation],
    ) -> Result<Vec<Violation>> {
        let frequencies = self.history.hash_frequencies(domain).await?;
        let total: u64 = frequencies.values().sum();
        if total == 0 {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let violations = observations
            .iter()
            .filter(|obs| seen.insert(obs.hash.as_str()))
            .filter_map(|obs| {
                let count = frequencies.get(&obs.hash).copied().unwrap_or(0);
                let share = count as f64 / total as f64;
                (share < self.threshold).then(|| {
                    Violation::new(
                        format!("anomaly_{}", &obs.hash[..obs.hash.len().min(8)]),
                        format!(
                            "Script {} is rare or previously unseen for {domain}",
                            obs.script_url
                        ),
                        Severity::Medium,
                    )
                    .with_confidence(share)
                })
            })
            .collect();

        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryScriptHistory;
    use vigil_db::ScriptRecord;

    fn observation(hash: &str) -> ScriptObservation {
        ScriptObservation {
            script_url: format!("https://shop.example/{hash}.js"),
            hash: hash.to_string(),
            response_size: Some(10),
        }
    }

    async fn history_with(counts: &[(&str, usize)]) -> Arc<InMemoryScriptHistory> {
        let history = Arc::new(InMemoryScriptHistory::new());
        for (hash, count) in counts {
            for _ in 0..*count {
                history
                    .append(&ScriptRecord {
                        scan_id: "past".to_string(),
                        domain: "shop.example".to_string(),
                        script_url: format!("https://shop.example/{hash}.js"),
                        hash: (*hash).to_string(),
                        response_size: Some(10),
                    })
                    .await
                    .expect("append");
            }
        }
        history
    }

    #[tokio::test]
    async fn test_boundary_share_is_not_flagged() {
        let history = history_with(&[("h1aaaaaaaa", 99), ("h2bbbbbbbb", 1)]).await;
        let detector = AnomalyDetector::new(history);

        let violations = detector
            .detect("shop.example", &[observation("h2bbbbbbbb")])
            .await
            .expect("detect");
        assert!(violations.is_empty());
    }

    #[tokio::test]
    async fn test_unseen_hash_is_flagged_with_zero_share() {
        let history = history_with(&[("h1aaaaaaaa", 99), ("h2bbbbbbbb", 1)]).await;
        let detector = AnomalyDetector::new(history);

        let violations = detector
            .detect(
                "shop.example",
                &[observation("h3cccccccc"), observation("h3cccccccc")],
            )
            .await
            .expect("detect");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].id, "anomaly_h3cccccc");
        assert_eq!(violations[0].severity, Severity::Medium);
        assert_eq!(violations[0].confidence, Some(0.0));
        assert!(violations[0].description.contains("https://shop.example/h3cccccccc.js"));
    }

    #[tokio::test]
    async fn test_empty_history_yields_nothing() {
        let detector = AnomalyDetector::new(Arc::new(InMemoryScriptHistory::new()));
        let violations = detector
            .detect("shop.example", &[observation("h3cccccccc")])
            .await
            .expect("detect");
        assert!(violations.is_empty());
    }

    #[tokio::test]
    async fn test_configurable_threshold() {
        let history = history_with(&[("h1aaaaaaaa", 9), ("h2bbbbbbbb", 1)]).await;
        let detector = AnomalyDetector::new(history).with_threshold(0.2);
        let violations = detector
            .detect(
                "shop.example",
                &[observation("h1aaaaaaaa"), observation("h2bbbbbbbb")],
            )
            .await
            .expect("detect");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].confidence, Some(0.1));
    }
}

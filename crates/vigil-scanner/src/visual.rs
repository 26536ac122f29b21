//! Dark-pattern classification of page screenshots.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use vigil_core::{Severity, Violation};

/// Labels the adapter acts on; anything else a classifier reports is ignored.
pub const DARK_PATTERN_LABELS: [&str; 3] = ["Confirmshaming", "Misdirection", "Sneaking"];

/// Default probability above which a label is flagged.
pub const DEFAULT_DARK_PATTERN_PROBABILITY: f64 = 0.70;

/// Image classifier returning a probability per dark-pattern label.
#[async_trait]
pub trait DarkPatternClassifier: Send + Sync {
    /// Probabilities for a PNG screenshot.
    async fn classify(&self, png: &[u8]) -> Result<HashMap<String, f64>>;
}

/// Classifier behind an HTTP endpoint.
///
/// Sends `{"image": "<base64 png>"}` and expects either a flat
/// `{label: probability}` object or one nested under `probabilities`.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct ClassifyRequest {
    image: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Nested { probabilities: HashMap<String, f64> },
    Flat(HashMap<String, f64>),
}

impl HttpClassifier {
    /// Classifier posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl DarkPatternClassifier for HttpClassifier {
    async fn classify(&self, png: &[u8]) -> Result<HashMap<String, f64>> {
        let unavailable = |e: reqwest::Error| ScanError::ClassifierUnavailable(e.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest {
                image: base64::engine::general_purpose::STANDARD.encode(png),
            })
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::ClassifierUnavailable(format!(
                "{} returned HTTP {}",
                self.endpoint,
                status.as_u16()
            )));
        }

        let parsed: ClassifyResponse = response.json().await.map_err(unavailable)?;
        Ok(match parsed {
            ClassifyResponse::Nested { probabilities } | ClassifyResponse::Flat(probabilities) => {
                probabilities
            }
        })
    }
}

/// Classifier used when no endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClassifier;

#[async_trait]
impl DarkPatternClassifier for DisabledClassifier {
    async fn classify(&self, _png: &[u8]) -> Result<HashMap<String, f64>> {
        Err(ScanError::ClassifierUnavailable(
            "no classifier configured".to_string(),
        ))
    }
}

/// Turns classifier probabilities into `high` violations.
#[derive(Clone)]
pub struct VisualAnomalyAdapter {
    classifier: Arc<dyn DarkPatternClassifier>,
    threshold: f64,
}

impl VisualAnomalyAdapter {
    /// Adapter over `classifier` with the default threshold.
    #[must_use]
    pub fn new(classifier: Arc<dyn DarkPatternClassifier>) -> Self {
        Self {
            classifier,
            threshold: DEFAULT_DARK_PATTERN_PROBABILITY,
        }
    }

    /// Override the probability threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Violations for one screenshot, in label order.
    ///
    /// A classifier failure is logged and yields no violations.
    pub async fn assess(&self, png: &[u8]) -> Vec<Violation> {
        match self.classifier.classify(png).await {
            Ok(probabilities) => self.violations_for(&probabilities),
            Err(e) => {
                warn!(error = %e, "dark-pattern classification skipped");
                Vec::new()
            }
        }
    }

    fn violations_for(&self, probabilities: &HashMap<String, f64>) -> Vec<Violation> {
        DARK_PATTERN_LABELS
            .iter()
            .filter_map(|label| {
                let probability = *probabilities.get(*label)?;
                (probability > self.threshold).then(|| {
                    Violation::new(
                        format!("dark_{}", label.to_lowercase()),
                        format!("Detected dark pattern: {label}"),
                        Severity::High,
                    )
                    .with_confidence(probability)
                })
            })
            .collect()
    }
}

//! Concurrent inspection of many URLs.

use crate::error::Result;
use crate::orchestrator::Inspector;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::info;
use vigil_core::ScanResult;

/// Outcome of one URL in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// URL that was inspected
    pub url: String,
    /// Scan result or the error that stopped it
    pub result: Result<ScanResult>,
}

/// Inspect every URL with at most `max_concurrent` scans in flight.
///
/// Outcomes are reported in completion order. A failing URL never stops
/// the rest of the batch.
pub async fn inspect_batch(
    inspector: &Inspector,
    urls: &[String],
    timeout_ms: u64,
    persona_id: Option<&str>,
    max_concurrent: usize,
) -> Vec<BatchOutcome> {
    let max_concurrent = max_concurrent.max(1);
    let mut in_flight = FuturesUnordered::new();
    let mut outcomes = Vec::with_capacity(urls.len());

    for url in urls {
        in_flight.push(async move {
            BatchOutcome {
                url: url.clone(),
                result: inspector.inspect(url, timeout_ms, persona_id).await,
            }
        });

        while in_flight.len() >= max_concurrent {
            if let Some(outcome) = in_flight.next().await {
                outcomes.push(outcome);
            }
        }
    }

    while let Some(outcome) = in_flight.next().await {
        outcomes.push(outcome);
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(total = outcomes.len(), failed, "batch finished");
    outcomes
}

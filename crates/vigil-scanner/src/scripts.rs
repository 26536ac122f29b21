//! Script integrity recording.

use crate::error::{Result, ScanError};
use crate::history::ScriptHistory;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_browser::location::resolve_against;
use vigil_core::ScriptObservation;
use vigil_db::ScriptRecord;

/// Default timeout for one script fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default number of scripts fetched at once.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Fetches a script body to measure its size.
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    /// Size of the body served at `url`, in bytes.
    async fn fetch_size(&self, url: &str) -> Result<u64>;
}

/// [`ScriptFetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpScriptFetcher {
    client: reqwest::Client,
}

impl HttpScriptFetcher {
    /// Fetcher that gives up on any request after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScriptFetcher for HttpScriptFetcher {
    async fn fetch_size(&self, url: &str) -> Result<u64> {
        let failed = |e: reqwest::Error| ScanError::ScriptFetchFailed {
            url: url.to_string(),
            cause: e.to_string(),
        };
        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(failed)?
            .bytes()
            .await
            .map_err(failed)?;
        Ok(body.len() as u64)
    }
}

/// Resolves, hashes, sizes and persists the scripts a page references.
pub struct ScriptIntegrityRecorder {
    fetcher: Arc<dyn ScriptFetcher>,
    history: Arc<dyn ScriptHistory>,
    concurrency: usize,
}

impl ScriptIntegrityRecorder {
    /// Recorder writing to `history`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ScriptFetcher>, history: Arc<dyn ScriptHistory>) -> Self {
        Self {
            fetcher,
            history,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Number of scripts fetched at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Record every script source of one page.
    ///
    /// Observations come back in document order and have all been handed to
    /// the history store by the time this returns.
    pub async fn record(
        &self,
        scan_id: &str,
        domain: &str,
        document_url: &str,
        sources: &[String],
    ) -> Vec<ScriptObservation> {
        let urls: Vec<String> = sources
            .iter()
            .filter(|src| !src.trim().is_empty())
            .filter_map(|src| {
                let resolved = resolve_against(document_url, src);
                if resolved.is_none() {
                    warn!(src = %src, document_url, "skipping unresolvable script source");
                }
                resolved
            })
            .collect();

        let observations: Vec<ScriptObservation> = stream::iter(urls)
            .map(|url| async move {
                let size = match self.fetcher.fetch_size(&url).await {
                    Ok(size) => Some(size),
                    Err(e) => {
                        debug!(error = %e, "script fetch failed");
                        None
                    }
                };
                ScriptObservation::new(url, size)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for observation in &observations {
            let record = ScriptRecord {
                scan_id: scan_id.to_string(),
                domain: domain.to_string(),
                script_url: observation.script_url.clone(),
                hash: observation.hash.clone(),
                response_size: observation.response_size,
            };
            if let Err(e) = self.history.append(&record).await {
                warn!(
                    script_url = %observation.script_url,
                    error = %e,
                    "failed to record script history"
                );
            }
        }

        observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryScriptHistory;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, u64>);

    #[async_trait]
    impl ScriptFetcher for MapFetcher {
        async fn fetch_size(&self, url: &str) -> Result<u64> {
            // The first script finishes last.
            if url.ends_with("app.js") {
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            self.0
                .get(url)
                .copied()
                .ok_or_else(|| ScanError::ScriptFetchFailed {
                    url: url.to_string(),
                    cause: "404".to_string(),
                })
        }
    }

    struct FailingHistory;

    #[async_trait]
    impl ScriptHistory for FailingHistory {
        async fn append(&self, _record: &ScriptRecord) -> Result<()> {
            Err(ScanError::Io(std::io::Error::other("disk full")))
        }

        async fn hash_frequencies(&self, _domain: &str) -> Result<HashMap<String, u64>> {
            Ok(HashMap::new())
        }
    }

    fn fetcher() -> Arc<MapFetcher> {
        Arc::new(MapFetcher(HashMap::from([
            ("https://shop.example/js/app.js".to_string(), 120),
            ("https://cdn.example/lib.js".to_string(), 4096),
        ])))
    }

    #[tokio::test]
    async fn test_record_resolves_and_persists_in_order() {
        let history = Arc::new(InMemoryScriptHistory::new());
        let recorder = ScriptIntegrityRecorder::new(fetcher(), history.clone());

        let sources = vec![
            "/js/app.js".to_string(),
            "https://cdn.example/lib.js".to_string(),
            "missing.js".to_string(),
            String::new(),
        ];
        let observations = recorder
            .record("scan-1", "shop.example", "https://shop.example/checkout/", &sources)
            .await;

        let urls: Vec<&str> = observations.iter().map(|o| o.script_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://shop.example/js/app.js",
                "https://cdn.example/lib.js",
                "https://shop.example/checkout/missing.js",
            ]
        );
        assert_eq!(observations[0].response_size, Some(120));
        assert_eq!(observations[1].response_size, Some(4096));
        assert_eq!(observations[2].response_size, None);

        let records = history.records();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.scan_id == "scan-1" && r.domain == "shop.example"));
        assert_eq!(records[0].hash, observations[0].hash);
    }

    #[tokio::test]
    async fn test_history_failure_still_returns_observations() {
        let recorder = ScriptIntegrityRecorder::new(fetcher(), Arc::new(FailingHistory));
        let observations = recorder
            .record(
                "scan-2",
                "shop.example",
                "https://shop.example/",
                &["/js/app.js".to_string()],
            )
            .await;
        assert_eq!(observations.len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_source_is_skipped() {
        let history = Arc::new(InMemoryScriptHistory::new());
        let recorder = ScriptIntegrityRecorder::new(fetcher(), history.clone());
        let observations = recorder
            .record("scan-3", "shop.example", "not a url", &["app.js".to_string()])
            .await;
        assert!(observations.is_empty());
        assert!(history.records().is_empty());
    }
}

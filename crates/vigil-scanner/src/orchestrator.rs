//! Scan orchestration.
//!
//! The [`Inspector`] drives one inspection end to end: it resolves the
//! persona, borrows a browsing context from its [`ContextProvider`],
//! navigates, collects evidence and always hands the context back, even
//! when navigation fails or times out.

use crate::capture::HtmlCapture;
use crate::error::{Result, ScanError};
use crate::extractor::{detect_cookie_banner, third_party_domains};
use crate::history::ScriptHistory;
use crate::scripts::{HttpScriptFetcher, ScriptIntegrityRecorder};
use crate::visual::{DarkPatternClassifier, VisualAnomalyAdapter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;
use vigil_browser::location::network_location;
use vigil_browser::{
    BrowsingContext, ContextProvider, PageSession, Persona, PersonaRegistry, SessionParams,
};
use vigil_core::{AppConfig, ScanId, ScanResult, ScanningConfig};

/// Timing and identity settings for inspections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorSettings {
    /// User agent for personas that do not set one
    pub default_user_agent: String,
    /// Quiet period that counts as network idle
    pub network_idle: Duration,
    /// How long to keep looking for a late cookie banner
    pub banner_grace: Duration,
}

impl Default for InspectorSettings {
    fn default() -> Self {
        Self::from(&ScanningConfig::default())
    }
}

impl From<&ScanningConfig> for InspectorSettings {
    fn from(config: &ScanningConfig) -> Self {
        Self {
            default_user_agent: config.user_agent.clone(),
            network_idle: Duration::from_millis(config.network_idle_ms),
            banner_grace: Duration::from_millis(config.banner_grace_ms),
        }
    }
}

/// Runs inspections against live pages.
pub struct Inspector {
    provider: Arc<dyn ContextProvider>,
    personas: Arc<PersonaRegistry>,
    recorder: ScriptIntegrityRecorder,
    visual: VisualAnomalyAdapter,
    capture: Option<HtmlCapture>,
    settings: InspectorSettings,
}

impl Inspector {
    /// Inspector with default settings and no HTML capture.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ContextProvider>,
        personas: Arc<PersonaRegistry>,
        recorder: ScriptIntegrityRecorder,
        visual: VisualAnomalyAdapter,
    ) -> Self {
        Self {
            provider,
            personas,
            recorder,
            visual,
            capture: None,
            settings: InspectorSettings::default(),
        }
    }

    /// Inspector wired from application configuration.
    ///
    /// Scripts are sized over HTTP and captures go to the configured
    /// capture directory.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn ContextProvider>,
        personas: Arc<PersonaRegistry>,
        history: Arc<dyn ScriptHistory>,
        classifier: Arc<dyn DarkPatternClassifier>,
    ) -> Result<Self> {
        let fetcher = HttpScriptFetcher::new(Duration::from_millis(
            config.scanning.script_fetch_timeout_ms,
        ))?;
        let recorder = ScriptIntegrityRecorder::new(Arc::new(fetcher), history)
            .with_concurrency(config.scanning.script_fetch_concurrency);
        let visual = VisualAnomalyAdapter::new(classifier)
            .with_threshold(config.thresholds.dark_pattern_probability);
        let capture_dir = config.capture_dir()?;

        Ok(Self::new(provider, personas, recorder, visual)
            .with_capture(HtmlCapture::new(capture_dir))
            .with_settings(InspectorSettings::from(&config.scanning)))
    }

    /// Write each page's HTML through `capture`.
    #[must_use]
    pub fn with_capture(mut self, capture: HtmlCapture) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Replace the timing settings.
    #[must_use]
    pub fn with_settings(mut self, settings: InspectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Inspect `url` under an optional persona.
    ///
    /// `timeout_ms` bounds navigation and settling; evidence collection
    /// afterwards is bounded by each step's own limits.
    pub async fn inspect(
        &self,
        url: &str,
        timeout_ms: u64,
        persona_id: Option<&str>,
    ) -> Result<ScanResult> {
        let started = Instant::now();
        info!(url, persona_id, "scan_started");

        let outcome = self.run(url, timeout_ms, persona_id, started).await;

        let duration_ms = elapsed_ms(started);
        match &outcome {
            Ok(result) => info!(
                url,
                persona_id,
                duration_ms,
                violations = result.violations.len(),
                "scan_completed"
            ),
            Err(e) => warn!(url, persona_id, duration_ms, error = %e, "scan_failed"),
        }
        outcome
    }

    async fn run(
        &self,
        url: &str,
        timeout_ms: u64,
        persona_id: Option<&str>,
        started: Instant,
    ) -> Result<ScanResult> {
        validate_url(url)?;
        let persona = self.resolve_persona(persona_id)?;
        let params = persona.session_params(&self.settings.default_user_agent);

        // Dropped contexts clean up after themselves, so cancelling this
        // future between acquire and release does not strand the context.
        let context = self.provider.acquire(&params).await?;
        debug!(context = context.id(), url, "acquired browsing context");

        let scan = Scan {
            url,
            persona_id,
            params: &params,
            started,
            started_nanos: chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            deadline: started + Duration::from_millis(timeout_ms),
            timeout_ms,
        };
        let outcome = self.scan_in_context(context.as_ref(), &scan).await;

        self.provider.release(context).await;
        outcome
    }

    fn resolve_persona(&self, persona_id: Option<&str>) -> Result<Persona> {
        match persona_id {
            None => Ok(Persona::default()),
            Some(id) => self
                .personas
                .get(id)
                .cloned()
                .map_err(|_| ScanError::InvalidPersona {
                    persona_id: id.to_string(),
                }),
        }
    }

    async fn scan_in_context(
        &self,
        context: &dyn BrowsingContext,
        scan: &Scan<'_>,
    ) -> Result<ScanResult> {
        let mut page = context.open_page(scan.params).await?;

        let outcome = self.navigate_and_collect(page.as_mut(), scan).await;

        if let Err(e) = page.close().await {
            debug!(url = scan.url, error = %e, "failed to close page");
        }
        outcome
    }

    async fn navigate_and_collect(
        &self,
        page: &mut dyn PageSession,
        scan: &Scan<'_>,
    ) -> Result<ScanResult> {
        let unreachable = |cause: String| ScanError::UnreachableTarget {
            url: scan.url.to_string(),
            cause,
        };

        let budget = scan.remaining();
        match tokio::time::timeout(budget, page.navigate(scan.url, budget)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(unreachable(e.to_string())),
            Err(_) => {
                return Err(unreachable(format!(
                    "navigation timed out after {} ms",
                    scan.timeout_ms
                )))
            }
        }

        let settle = page.wait_for_network_idle(self.settings.network_idle, scan.deadline);
        if tokio::time::timeout(scan.remaining(), settle).await.is_err() {
            debug!(url = scan.url, "page did not settle before the deadline");
        }

        Ok(self.collect_evidence(page, scan).await)
    }

    async fn collect_evidence(&self, page: &dyn PageSession, scan: &Scan<'_>) -> ScanResult {
        let url = scan.url;
        let scan_id = ScanId::derive(url, scan.started_nanos);
        let location = network_location(url).unwrap_or_default();
        let document_url = page
            .document_url()
            .await
            .unwrap_or_else(|_| url.to_string());

        let capture_path = match &self.capture {
            Some(capture) => match page.content().await {
                Ok(html) => match capture.write(&location, &html).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(url, error = %e, "failed to write HTML capture");
                        None
                    }
                },
                Err(e) => {
                    warn!(url, error = %e, "failed to read page content");
                    None
                }
            },
            None => None,
        };

        let violations = match page.screenshot().await {
            Ok(png) => self.visual.assess(&png).await,
            Err(e) => {
                warn!(url, error = %e, "screenshot failed");
                Vec::new()
            }
        };

        let robots_meta = page.robots_meta().await.unwrap_or_else(|e| {
            warn!(url, error = %e, "robots meta lookup failed");
            None
        });

        let cookies = page.cookies().await.unwrap_or_else(|e| {
            warn!(url, error = %e, "cookie lookup failed");
            Vec::new()
        });

        let banner_selectors =
            detect_cookie_banner(page, self.settings.banner_grace, scan.deadline).await;

        let sources = page.script_sources().await.unwrap_or_else(|e| {
            warn!(url, error = %e, "script enumeration failed");
            Vec::new()
        });
        let scripts = self
            .recorder
            .record(scan_id.as_str(), &location, &document_url, &sources)
            .await;

        let network_requests = page.requested_urls();
        let third_party = third_party_domains(url, &network_requests);

        ScanResult {
            url: url.to_string(),
            cookies,
            cookie_banner_detected: !banner_selectors.is_empty(),
            cookie_banner_selectors: banner_selectors,
            scan_time_ms: elapsed_ms(scan.started),
            robots_meta,
            network_requests,
            third_party_domains: third_party,
            persona_id: scan.persona_id.map(str::to_string),
            scripts,
            violations,
            scan_id,
            capture_path,
        }
    }
}

struct Scan<'a> {
    url: &'a str,
    persona_id: Option<&'a str>,
    params: &'a SessionParams,
    started: Instant,
    started_nanos: i64,
    deadline: Instant,
    timeout_ms: u64,
}

impl Scan<'_> {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

fn validate_url(url: &str) -> Result<()> {
    let invalid = |reason: String| ScanError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

//! Scripted browser doubles shared by the scanner integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use vigil_browser::{
    BrowserError, BrowsingContext, ContextPool, PageSession, PersonaRegistry, PooledProvider,
    SessionParams,
};
use vigil_core::CookieRecord;
use vigil_scanner::{
    DarkPatternClassifier, InMemoryScriptHistory, Inspector, InspectorSettings, ScriptFetcher,
    ScriptIntegrityRecorder, VisualAnomalyAdapter,
};

pub const PERSONAS: &str = r#"{
    "de-visitor": {
        "headers": { "Accept-Language": "de-DE,de;q=0.9" },
        "viewport": { "width": 390, "height": 844 },
        "accessibility": "low-vision"
    }
}"#;

/// How navigation behaves on the fake site.
#[derive(Debug, Clone, Default)]
pub enum Navigation {
    #[default]
    Loads,
    Fails(String),
    Hangs,
}

/// Everything the fake site serves.
#[derive(Debug, Clone, Default)]
pub struct Site {
    pub navigation: Navigation,
    pub requests: Vec<String>,
    pub cookies: Vec<CookieRecord>,
    pub robots: Option<String>,
    pub scripts: Vec<String>,
    pub html: String,
    /// When the cookie banner shows up after the page opens; `None` for never
    pub banner_after: Option<Duration>,
}

impl Site {
    pub fn shop() -> Self {
        Self {
            requests: vec![
                "https://shop.example/".to_string(),
                "https://shop.example/static/app.js".to_string(),
                "https://cdn.tracker.example/t.js".to_string(),
                "https://fonts.example/inter.woff2".to_string(),
                "data:image/gif;base64,R0lGOD".to_string(),
            ],
            cookies: vec![CookieRecord {
                name: "_ga".to_string(),
                domain: ".shop.example".to_string(),
                path: "/".to_string(),
                secure: true,
                http_only: false,
                same_site: Some("Lax".to_string()),
                expires: Some(1_900_000_000.0),
            }],
            robots: Some("noindex, nofollow".to_string()),
            scripts: vec![
                "/static/app.js".to_string(),
                "https://cdn.tracker.example/t.js".to_string(),
            ],
            html: "<html><body>shop</body></html>".to_string(),
            banner_after: Some(Duration::ZERO),
            ..Self::default()
        }
    }
}

/// Counters shared between the harness and its fakes.
#[derive(Debug, Default)]
pub struct PageCounters {
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub params: Mutex<Vec<SessionParams>>,
}

impl PageCounters {
    pub fn opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }
}

struct FakePage {
    site: Arc<Site>,
    pages: Arc<PageCounters>,
    opened_at: Instant,
    url: Option<String>,
}

#[async_trait]
impl PageSession for FakePage {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> vigil_browser::Result<()> {
        match &self.site.navigation {
            Navigation::Loads => {
                self.url = Some(url.to_string());
                Ok(())
            }
            Navigation::Fails(reason) => Err(BrowserError::NavigationError(reason.clone())),
            Navigation::Hangs => std::future::pending().await,
        }
    }

    async fn wait_for_network_idle(&self, _idle: Duration, _deadline: Instant) {}

    async fn document_url(&self) -> vigil_browser::Result<String> {
        self.url
            .clone()
            .ok_or_else(|| BrowserError::QueryError("no document".to_string()))
    }

    async fn content(&self) -> vigil_browser::Result<String> {
        Ok(self.site.html.clone())
    }

    async fn screenshot(&self) -> vigil_browser::Result<Vec<u8>> {
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn robots_meta(&self) -> vigil_browser::Result<Option<String>> {
        Ok(self.site.robots.clone())
    }

    async fn cookies(&self) -> vigil_browser::Result<Vec<CookieRecord>> {
        Ok(self.site.cookies.clone())
    }

    async fn matches_selector(&self, selector: &str) -> vigil_browser::Result<bool> {
        if selector == r#"[class*="gdpr"]"# {
            return Err(BrowserError::QueryError("selector engine crashed".to_string()));
        }
        let visible = self
            .site
            .banner_after
            .is_some_and(|after| self.opened_at.elapsed() >= after);
        Ok(visible && matches!(selector, r#"[id*="cookie"]"# | "#cookie-banner"))
    }

    async fn script_sources(&self) -> vigil_browser::Result<Vec<String>> {
        Ok(self.site.scripts.clone())
    }

    fn requested_urls(&self) -> Vec<String> {
        self.site.requests.clone()
    }

    async fn close(self: Box<Self>) -> vigil_browser::Result<()> {
        self.pages.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeContext {
    id: String,
    site: Arc<Site>,
    pages: Arc<PageCounters>,
}

#[async_trait]
impl BrowsingContext for FakeContext {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_page(
        &self,
        params: &SessionParams,
    ) -> vigil_browser::Result<Box<dyn PageSession>> {
        self.pages.pages_opened.fetch_add(1, Ordering::SeqCst);
        self.pages
            .params
            .lock()
            .expect("lock")
            .push(params.clone());
        Ok(Box::new(FakePage {
            site: Arc::clone(&self.site),
            pages: Arc::clone(&self.pages),
            opened_at: Instant::now(),
            url: None,
        }))
    }

    async fn close(self: Box<Self>) -> vigil_browser::Result<()> {
        Ok(())
    }
}

pub struct FixedSize(pub u64);

#[async_trait]
impl ScriptFetcher for FixedSize {
    async fn fetch_size(&self, _url: &str) -> vigil_scanner::Result<u64> {
        Ok(self.0)
    }
}

pub struct FixedClassifier(pub HashMap<String, f64>);

#[async_trait]
impl DarkPatternClassifier for FixedClassifier {
    async fn classify(&self, _png: &[u8]) -> vigil_scanner::Result<HashMap<String, f64>> {
        Ok(self.0.clone())
    }
}

/// An inspector over a pool of fake contexts that all serve `site`.
pub struct Harness {
    pub inspector: Inspector,
    pub pool: Arc<ContextPool>,
    pub history: Arc<InMemoryScriptHistory>,
    pub pages: Arc<PageCounters>,
}

pub fn harness(site: Site, pool_size: usize, settings: InspectorSettings) -> Harness {
    let site = Arc::new(site);
    let pages = Arc::new(PageCounters::default());
    let contexts: Vec<Box<dyn BrowsingContext>> = (0..pool_size)
        .map(|n| {
            Box::new(FakeContext {
                id: format!("fake-{n}"),
                site: Arc::clone(&site),
                pages: Arc::clone(&pages),
            }) as Box<dyn BrowsingContext>
        })
        .collect();
    let pool = Arc::new(ContextPool::from_contexts(contexts));
    let provider = Arc::new(PooledProvider::new(
        Arc::clone(&pool),
        Duration::from_millis(100),
    ));

    let history = Arc::new(InMemoryScriptHistory::new());
    let recorder = ScriptIntegrityRecorder::new(Arc::new(FixedSize(2048)), history.clone());
    let visual = VisualAnomalyAdapter::new(Arc::new(FixedClassifier(HashMap::from([(
        "Sneaking".to_string(),
        0.93,
    )]))));
    let personas = Arc::new(PersonaRegistry::from_json(PERSONAS).expect("parse personas"));

    let inspector =
        Inspector::new(provider, personas, recorder, visual).with_settings(settings);

    Harness {
        inspector,
        pool,
        history,
        pages,
    }
}

pub fn quick_settings() -> InspectorSettings {
    InspectorSettings {
        default_user_agent: "VigilTest/1.0".to_string(),
        network_idle: Duration::from_millis(10),
        banner_grace: Duration::ZERO,
    }
}

use crate::error::{BrowserError, Result};
use crate::persona::SessionParams;
use crate::session::{BrowsingContext, ContextFactory, PageSession};
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetLocaleOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::cdp::browser_protocol::storage::GetCookiesParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use vigil_core::{BrowserConfig, CookieRecord};

const IDLE_POLL: Duration = Duration::from_millis(100);

fn chromium_err(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::ChromiumError(e.to_string())
}

/// Chromium browser shared by every context the engine creates.
pub struct ChromiumEngine {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    next_context: AtomicUsize,
}

impl ChromiumEngine {
    /// Launch Chromium according to the browser section of the configuration.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = LaunchConfig::builder()
            .no_sandbox()
            .window_size(config.window_width, config.window_height)
            .arg("--disable-dev-shm-usage");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let launch = builder.build().map_err(BrowserError::BrowserNotFound)?;

        let (browser, mut handler) = Browser::launch(launch).await.map_err(chromium_err)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
        });

        tracing::info!(headless = config.headless, "launched chromium");

        Ok(Self {
            browser: Arc::new(browser),
            handler,
            next_context: AtomicUsize::new(1),
        })
    }

    /// Close the browser. Contexts still alive keep it open until dropped.
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    tracing::warn!(error = %e, "failed to close browser cleanly");
                }
                let _ = browser.wait().await;
            }
            Err(_) => tracing::warn!("browser still referenced by open contexts at shutdown"),
        }
        self.handler.abort();
    }
}

#[async_trait::async_trait]
impl ContextFactory for ChromiumEngine {
    async fn create_context(&self, proxy: Option<&str>) -> Result<Box<dyn BrowsingContext>> {
        let mut params = CreateBrowserContextParams::default();
        params.proxy_server = proxy.map(str::to_string);

        let created = self.browser.execute(params).await.map_err(chromium_err)?;
        let label = format!(
            "ctx-{}",
            self.next_context.fetch_add(1, Ordering::Relaxed)
        );
        tracing::debug!(context = %label, proxied = proxy.is_some(), "created browser context");

        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            context_id: created.result.browser_context_id.clone(),
            label,
        }))
    }
}

/// Incognito-style browser context with its own cookie jar.
pub struct ChromiumContext {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    label: String,
}

impl ChromiumContext {
    async fn configure(page: &Page, params: &SessionParams) -> Result<()> {
        let mut ua = SetUserAgentOverrideParams::new(params.user_agent.clone());
        ua.accept_language = Some(params.locale.clone());
        page.execute(ua).await.map_err(chromium_err)?;

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(params.viewport.width),
            i64::from(params.viewport.height),
            1.0,
            false,
        ))
        .await
        .map_err(chromium_err)?;

        let mut locale = SetLocaleOverrideParams::default();
        locale.locale = Some(params.locale.clone());
        page.execute(locale).await.map_err(chromium_err)?;

        if !params.extra_headers.is_empty() {
            let headers = serde_json::to_value(&params.extra_headers)
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
                .await
                .map_err(chromium_err)?;
        }

        if let Some(mode) = params.accessibility {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                mode.init_script().to_string(),
            ))
            .await
            .map_err(chromium_err)?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowsingContext for ChromiumContext {
    fn id(&self) -> &str {
        &self.label
    }

    async fn open_page(&self, params: &SessionParams) -> Result<Box<dyn PageSession>> {
        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(self.context_id.clone());
        let page = self.browser.new_page(target).await.map_err(chromium_err)?;

        Self::configure(&page, params).await?;

        let log = Arc::new(NetworkLog::new());
        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(chromium_err)?;
        let listener_log = Arc::clone(&log);
        let listener = tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                listener_log.record(event.request.url.clone());
            }
        });

        Ok(Box::new(ChromiumPage {
            page,
            context_id: self.context_id.clone(),
            log,
            listener,
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
            .map_err(chromium_err)?;
        tracing::debug!(context = %self.label, "disposed browser context");
        Ok(())
    }
}

/// Requests observed on a page plus the time of the latest one.
#[derive(Debug)]
struct NetworkLog {
    urls: Mutex<Vec<String>>,
    last_activity: Mutex<Instant>,
}

impl NetworkLog {
    fn new() -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    fn record(&self, url: String) {
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url);
        }
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    fn quiet_for(&self) -> Duration {
        self.last_activity
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }

    fn snapshot(&self) -> Vec<String> {
        self.urls.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

/// A page opened through [`ChromiumContext`].
pub struct ChromiumPage {
    page: Page,
    context_id: BrowserContextId,
    log: Arc<NetworkLog>,
    listener: JoinHandle<()>,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::QueryError(e.to_string()))?;
        let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value).map_err(|e| BrowserError::QueryError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl PageSession for ChromiumPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationError(e.to_string())),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {url} exceeded {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn wait_for_network_idle(&self, idle: Duration, deadline: Instant) {
        loop {
            if self.log.quiet_for() >= idle || Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    async fn document_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::QueryError(e.to_string()))?
            .ok_or_else(|| BrowserError::QueryError("page has no URL".to_string()))
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::QueryError(e.to_string()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| BrowserError::QueryError(e.to_string()))
    }

    async fn robots_meta(&self) -> Result<Option<String>> {
        self.eval(
            r#"(() => {
                const meta = document.querySelector('meta[name="robots" i]');
                return meta ? meta.getAttribute('content') : null;
            })()"#,
        )
        .await
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        let mut params = GetCookiesParams::default();
        params.browser_context_id = Some(self.context_id.clone());
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| BrowserError::QueryError(e.to_string()))?;

        Ok(response
            .result
            .cookies
            .iter()
            .map(|c| CookieRecord {
                name: c.name.clone(),
                domain: c.domain.clone(),
                path: c.path.clone(),
                secure: c.secure,
                http_only: c.http_only,
                same_site: c.same_site.as_ref().map(|s| s.as_ref().to_string()),
                expires: if c.session { None } else { Some(c.expires) },
            })
            .collect())
    }

    async fn matches_selector(&self, selector: &str) -> Result<bool> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| BrowserError::QueryError(e.to_string()))?;
        self.eval(&format!("document.querySelector({quoted}) !== null"))
            .await
    }

    async fn script_sources(&self) -> Result<Vec<String>> {
        self.eval(
            "Array.from(document.querySelectorAll('script[src]')).map(s => s.getAttribute('src'))",
        )
        .await
    }

    fn requested_urls(&self) -> Vec<String> {
        self.log.snapshot()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.listener.abort();
        self.page.close().await.map_err(chromium_err)
    }
}

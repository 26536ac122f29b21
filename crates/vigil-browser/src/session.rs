use crate::error::Result;
use crate::persona::SessionParams;
use std::time::{Duration, Instant};
use vigil_core::CookieRecord;

/// One page open inside a browsing context.
///
/// Every method that touches the page may suspend; none of them block
/// other pages sharing the same browser.
#[async_trait::async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate to a URL, giving up after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait until no request has started for `idle`, or until `deadline`.
    async fn wait_for_network_idle(&self, idle: Duration, deadline: Instant);

    /// URL of the loaded document, after redirects.
    async fn document_url(&self) -> Result<String>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String>;

    /// Full-page PNG screenshot.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Content of `<meta name="robots">`, if present.
    async fn robots_meta(&self) -> Result<Option<String>>;

    /// Cookies held by the session.
    async fn cookies(&self) -> Result<Vec<CookieRecord>>;

    /// Whether any element matches a CSS selector.
    async fn matches_selector(&self, selector: &str) -> Result<bool>;

    /// Raw `src` attribute of every `<script src>` element, in document order.
    async fn script_sources(&self) -> Result<Vec<String>>;

    /// Every request URL the page has started so far, in order.
    fn requested_urls(&self) -> Vec<String>;

    /// Close the page.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// An isolated browsing session with its own cookie jar.
#[async_trait::async_trait]
pub trait BrowsingContext: Send + Sync {
    /// Stable label for logging.
    fn id(&self) -> &str;

    /// Open a page configured for the given session parameters.
    async fn open_page(&self, params: &SessionParams) -> Result<Box<dyn PageSession>>;

    /// Tear the context down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Something that can create browsing contexts.
#[async_trait::async_trait]
pub trait ContextFactory: Send + Sync {
    /// Create a fresh context, optionally routed through a proxy.
    async fn create_context(&self, proxy: Option<&str>) -> Result<Box<dyn BrowsingContext>>;
}

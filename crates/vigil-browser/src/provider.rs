//! Where a scan gets its browsing context from.
//!
//! Both providers hand out contexts that clean up after themselves when
//! dropped, so a scan future that is cancelled mid-flight never strands one.

use crate::error::{self, PoolError};
use crate::persona::SessionParams;
use crate::pool::ContextPool;
use crate::session::{BrowsingContext, ContextFactory, PageSession};
use std::sync::Arc;
use std::time::Duration;

/// Source of a browsing context for one scan.
#[async_trait::async_trait]
pub trait ContextProvider: Send + Sync {
    /// Obtain a context suitable for the given session.
    async fn acquire(&self, params: &SessionParams) -> Result<Box<dyn BrowsingContext>, PoolError>;

    /// Hand the context back once the scan is finished with it.
    async fn release(&self, ctx: Box<dyn BrowsingContext>);
}

/// Lends contexts from a shared [`ContextPool`].
///
/// Pooled contexts are created without a proxy, so a persona proxy is not
/// applied on this path.
pub struct PooledProvider {
    pool: Arc<ContextPool>,
    acquire_timeout: Duration,
}

impl PooledProvider {
    /// Borrow from `pool`, waiting at most `acquire_timeout` per scan.
    pub fn new(pool: Arc<ContextPool>, acquire_timeout: Duration) -> Self {
        Self {
            pool,
            acquire_timeout,
        }
    }

    /// The pool contexts are borrowed from.
    pub fn pool(&self) -> &Arc<ContextPool> {
        &self.pool
    }
}

#[async_trait::async_trait]
impl ContextProvider for PooledProvider {
    async fn acquire(&self, params: &SessionParams) -> Result<Box<dyn BrowsingContext>, PoolError> {
        if let Some(proxy) = &params.proxy {
            tracing::warn!(proxy = %proxy, "pooled contexts ignore persona proxy");
        }
        let ctx = self.pool.acquire_timeout(self.acquire_timeout).await?;
        Ok(Box::new(ctx))
    }

    async fn release(&self, ctx: Box<dyn BrowsingContext>) {
        // Closing a pooled guard returns it to the pool.
        let _ = ctx.close().await;
    }
}

/// Creates a fresh context per scan and closes it afterwards.
pub struct EphemeralProvider {
    factory: Arc<dyn ContextFactory>,
}

impl EphemeralProvider {
    /// Create contexts from `factory`, one per scan.
    pub fn new(factory: Arc<dyn ContextFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait::async_trait]
impl ContextProvider for EphemeralProvider {
    async fn acquire(&self, params: &SessionParams) -> Result<Box<dyn BrowsingContext>, PoolError> {
        let ctx = self
            .factory
            .create_context(params.proxy.as_deref())
            .await?;
        Ok(Box::new(EphemeralContext { ctx: Some(ctx) }))
    }

    async fn release(&self, ctx: Box<dyn BrowsingContext>) {
        let id = ctx.id().to_string();
        if let Err(e) = ctx.close().await {
            tracing::warn!(context = %id, error = %e, "failed to close ephemeral context");
        }
    }
}

/// A per-scan context that is closed in the background if dropped unclosed.
struct EphemeralContext {
    ctx: Option<Box<dyn BrowsingContext>>,
}

impl EphemeralContext {
    fn inner(&self) -> &dyn BrowsingContext {
        self.ctx
            .as_deref()
            .expect("ephemeral context is held until closed")
    }
}

impl Drop for EphemeralContext {
    fn drop(&mut self) {
        let Some(ctx) = self.ctx.take() else {
            return;
        };
        let id = ctx.id().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(context = %id, "closing abandoned ephemeral context");
                handle.spawn(async move {
                    if let Err(e) = ctx.close().await {
                        tracing::warn!(context = %id, error = %e, "failed to close ephemeral context");
                    }
                });
            }
            Err(_) => tracing::warn!(context = %id, "ephemeral context dropped outside a runtime"),
        }
    }
}

#[async_trait::async_trait]
impl BrowsingContext for EphemeralContext {
    fn id(&self) -> &str {
        self.inner().id()
    }

    async fn open_page(&self, params: &SessionParams) -> error::Result<Box<dyn PageSession>> {
        self.inner().open_page(params).await
    }

    async fn close(self: Box<Self>) -> error::Result<()> {
        let mut this = self;
        match this.ctx.take() {
            Some(ctx) => ctx.close().await,
            None => Ok(()),
        }
    }
}

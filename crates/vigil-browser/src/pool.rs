//! Fixed-size pool of browsing contexts.
//!
//! Contexts are created once at [`ContextPool::init`] and lent out behind a
//! [`PooledContext`] guard, so a context has exactly one borrower at a time.
//! Waiting callers queue on a fair semaphore; each guard holds one permit.

use crate::error::{self, PoolError};
use crate::persona::SessionParams;
use crate::session::{BrowsingContext, ContextFactory, PageSession};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type IdleSet = Arc<Mutex<Vec<Box<dyn BrowsingContext>>>>;

/// Fixed set of browsing contexts shared by concurrent scans.
pub struct ContextPool {
    idle: IdleSet,
    permits: Arc<Semaphore>,
    size: usize,
}

impl ContextPool {
    /// Create `size` contexts from the factory.
    pub async fn init(factory: &dyn ContextFactory, size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::InvalidSize);
        }

        let mut contexts = Vec::with_capacity(size);
        for _ in 0..size {
            match factory.create_context(None).await {
                Ok(ctx) => contexts.push(ctx),
                Err(e) => {
                    for ctx in contexts {
                        let _ = ctx.close().await;
                    }
                    return Err(e.into());
                }
            }
        }

        tracing::info!(size, "initialized browser context pool");
        Ok(Self::from_contexts(contexts))
    }

    /// Build a pool around contexts that already exist.
    pub fn from_contexts(contexts: Vec<Box<dyn BrowsingContext>>) -> Self {
        let size = contexts.len();
        Self {
            idle: Arc::new(Mutex::new(contexts)),
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait until a context is free and take it.
    ///
    /// The context goes back to the pool when the returned guard is dropped,
    /// including when the borrowing task is cancelled or panics.
    pub async fn acquire(&self) -> Result<PooledContext, PoolError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let ctx = lock(&self.idle).pop().ok_or(PoolError::Closed)?;
        tracing::debug!(context = ctx.id(), "acquired browser context");
        Ok(PooledContext {
            ctx: Some(ctx),
            idle: Arc::clone(&self.idle),
            _permit: permit,
        })
    }

    /// Like [`acquire`](Self::acquire) but gives up after `wait`.
    pub async fn acquire_timeout(&self, wait: Duration) -> Result<PooledContext, PoolError> {
        match tokio::time::timeout(wait, self.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Exhausted { waited: wait }),
        }
    }

    /// Return a context to the idle set, waking one waiter.
    pub fn release(&self, ctx: PooledContext) {
        drop(ctx);
    }

    /// Number of idle contexts.
    pub fn available(&self) -> usize {
        lock(&self.idle).len()
    }

    /// Number of contexts currently lent out.
    pub fn checked_out(&self) -> usize {
        self.size - self.available()
    }

    /// Number of contexts the pool was created with.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Close every context. Fails while any context is still borrowed.
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        let contexts = {
            let mut idle = lock(&self.idle);
            let checked_out = self.size - idle.len();
            if checked_out > 0 {
                return Err(PoolError::ContextsCheckedOut(checked_out));
            }
            self.permits.close();
            std::mem::take(&mut *idle)
        };

        for ctx in contexts {
            let id = ctx.id().to_string();
            if let Err(e) = ctx.close().await {
                tracing::warn!(context = %id, error = %e, "failed to close browser context");
            }
        }
        tracing::info!(size = self.size, "browser context pool shut down");
        Ok(())
    }
}

fn lock(idle: &IdleSet) -> std::sync::MutexGuard<'_, Vec<Box<dyn BrowsingContext>>> {
    idle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A context borrowed from a [`ContextPool`].
///
/// Dropping the guard puts the context back in the idle set and frees its
/// permit. [`BrowsingContext::close`] on a guard returns it the same way; the
/// underlying context stays open for the next borrower.
pub struct PooledContext {
    ctx: Option<Box<dyn BrowsingContext>>,
    idle: IdleSet,
    // Released after `Drop::drop` has pushed the context back.
    _permit: OwnedSemaphorePermit,
}

impl PooledContext {
    fn inner(&self) -> &dyn BrowsingContext {
        self.ctx
            .as_deref()
            .expect("pooled context is held until the guard drops")
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            tracing::debug!(context = ctx.id(), "released browser context");
            lock(&self.idle).push(ctx);
        }
    }
}

#[async_trait::async_trait]
impl BrowsingContext for PooledContext {
    fn id(&self) -> &str {
        self.inner().id()
    }

    async fn open_page(&self, params: &SessionParams) -> error::Result<Box<dyn PageSession>> {
        self.inner().open_page(params).await
    }

    async fn close(self: Box<Self>) -> error::Result<()> {
        drop(self);
        Ok(())
    }
}

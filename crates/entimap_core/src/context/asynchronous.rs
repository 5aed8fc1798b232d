//! Async entry points.
//!
//! Each wrapper checks the token and then runs the blocking implementation
//! on tokio's blocking pool, so connection I/O never stalls a runtime
//! worker and sync and async calls share one code path. The context is
//! moved into the blocking task, hence the `Arc` receivers.

use super::cancel::CancellationToken;
use super::engine::{DbContext, Page};
use crate::error::{CoreError, CoreResult};
use crate::metadata::Entity;
use crate::query::QueryOptions;
use std::sync::Arc;

/// Runs `work` on the blocking pool once the token has been checked.
async fn offload<R, F>(cancel: &CancellationToken, work: F) -> CoreResult<R>
where
    R: Send + 'static,
    F: FnOnce() -> CoreResult<R> + Send + 'static,
{
    cancel.check()?;
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            tracing::warn!(error = %e, "blocking task did not complete");
            Err(CoreError::Cancelled)
        }
    }
}

impl DbContext {
    /// Async [`flush`](Self::flush). The token is also checked before each
    /// I/O step; a cancelled flush drains the queue like a failed one.
    pub async fn flush_async(self: &Arc<Self>, cancel: &CancellationToken) -> CoreResult<u64> {
        if let Err(e) = cancel.check() {
            self.discard_pending();
            return Err(e);
        }
        let context = Arc::clone(self);
        let token = cancel.clone();
        offload(cancel, move || context.flush_with_cancel(&token)).await
    }

    /// Async [`find_many`](Self::find_many).
    pub async fn find_many_async<T: Entity>(
        self: &Arc<Self>,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<T>> {
        let (context, options) = (Arc::clone(self), options.clone());
        offload(cancel, move || context.find_many(&options)).await
    }

    /// Async [`find_page`](Self::find_page).
    pub async fn find_page_async<T: Entity>(
        self: &Arc<Self>,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> CoreResult<Page<T>> {
        let (context, options) = (Arc::clone(self), options.clone());
        offload(cancel, move || context.find_page(&options)).await
    }

    /// Async [`count`](Self::count).
    pub async fn count_async<T: Entity>(
        self: &Arc<Self>,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> CoreResult<u64> {
        let (context, options) = (Arc::clone(self), options.clone());
        offload(cancel, move || context.count::<T>(&options)).await
    }

    /// Async [`exists`](Self::exists).
    pub async fn exists_async<T: Entity>(
        self: &Arc<Self>,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> CoreResult<bool> {
        let (context, options) = (Arc::clone(self), options.clone());
        offload(cancel, move || context.exists::<T>(&options)).await
    }
}

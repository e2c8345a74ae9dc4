//! Admission control for async work.
//!
//! Bounds how many tasks run at once without pooling any resource
//! objects. Queued tasks are admitted strictly in submission order
//! (the semaphore is fair), which keeps this usable in front of a
//! [`ResourcePool`](crate::pool::ResourcePool) whose own wait path is
//! timeout-bounded.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::trace;

use crate::utils::{PixelResult, PoolError};

/// Bounds the number of simultaneously running async tasks.
///
/// Cloning is cheap and clones share the same limit.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    limit: usize,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> PixelResult<Self> {
        if limit == 0 {
            return Err(PoolError::config("limit must be greater than 0").into());
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            active: Arc::new(AtomicUsize::new(0)),
            limit,
        })
    }

    /// Run `task` once a slot is free. Slots are granted in the order
    /// `run` was called; the active count is decremented even when the
    /// task panics or its future is dropped mid-flight.
    pub async fn run<F>(&self, task: F) -> PixelResult<F::Output>
    where
        F: Future,
    {
        let _permit = self.semaphore.acquire().await?;
        let _guard = ActiveGuard::enter(&self.active);
        trace!(
            active = self.active.load(Ordering::SeqCst),
            limit = self.limit,
            "Task admitted"
        );
        Ok(task.await)
    }

    /// Number of tasks currently running.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl std::fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyLimiter")
            .field("limit", &self.limit)
            .field("active", &self.active_count())
            .finish()
    }
}

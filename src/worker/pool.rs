//! Pooling for managed workers.

use std::time::Duration;

use tracing::debug;

use crate::pool::{default_pool_size, PoolConfig, ResourcePool};
use crate::utils::PixelResult;
use crate::worker::backend::WorkerBackend;
use crate::worker::dispatcher::ManagedWorker;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolOptions {
    /// Maximum number of worker threads
    pub size: usize,
    /// How long an acquire waits for a free worker
    pub acquire_timeout: Duration,
}

impl Default for WorkerPoolOptions {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Build a [`ResourcePool`] of [`ManagedWorker`]s.
///
/// Workers are spawned lazily as demand arrives and terminated by the
/// pool's disposer. To change concurrency, dispose this pool and build a
/// new one; workers carry no state worth migrating.
pub fn spawn_worker_pool<B, F>(
    options: WorkerPoolOptions,
    make_backend: F,
) -> PixelResult<ResourcePool<ManagedWorker>>
where
    B: WorkerBackend,
    F: Fn() -> B + Clone + Send + Sync + 'static,
{
    debug!(size = options.size, "Creating worker pool");
    ResourcePool::new(
        PoolConfig {
            max_size: options.size,
            acquire_timeout: options.acquire_timeout,
        },
        move || ManagedWorker::spawn(make_backend.clone()),
        |worker| {
            worker.terminate();
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DecodedFrame, ResizeOptions};
    use crate::utils::{PixelError, WorkerError};

    fn solid_backend() -> impl WorkerBackend {
        |payload: &[u8], _resize: Option<&ResizeOptions>| {
            if payload.first() == Some(&0xFF) {
                panic!("backend crash requested");
            }
            Ok(DecodedFrame::new(1, 1, vec![payload[0], 0, 0, 255]))
        }
    }

    #[tokio::test]
    async fn pooled_worker_executes_tasks() {
        let pool = spawn_worker_pool(
            WorkerPoolOptions {
                size: 2,
                ..Default::default()
            },
            solid_backend,
        )
        .unwrap();

        let worker = pool.acquire().await.unwrap();
        let frame = worker.post_task(vec![9], None).await.unwrap();
        assert_eq!(frame.pixels[0], 9);
        pool.release(worker).await.unwrap();

        pool.dispose().await;
    }

    #[tokio::test]
    async fn fresh_worker_succeeds_after_a_fault() {
        let pool = spawn_worker_pool(
            WorkerPoolOptions {
                size: 1,
                ..Default::default()
            },
            solid_backend,
        )
        .unwrap();

        let worker = pool.acquire().await.unwrap();
        let crashed = worker.post_task(vec![0xFF], None).await;
        assert!(matches!(
            crashed,
            Err(PixelError::Worker(WorkerError::Fault(_)))
        ));

        // Retire the faulted worker; the next acquire spawns a fresh one.
        pool.retire(worker).await.unwrap();
        let replacement = pool.acquire().await.unwrap();
        assert!(replacement.is_healthy());
        let frame = replacement.post_task(vec![5], None).await.unwrap();
        assert_eq!(frame.pixels[0], 5);
        pool.release(replacement).await.unwrap();

        pool.dispose().await;
    }
}

//! Decode orchestration.
//!
//! Thin composition of the pieces: admission control in front of the
//! surface pool, worker checkout for the off-thread path, and the
//! geometry calculator between decode and draw. All pools are passed in
//! explicitly; [`DecodePipeline::builder`] is the convenience
//! composition root.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::core::{
    calc_resize_rect, BitmapDecoder, DecodeOptions, DecodedFrame, RasterSurface, ResizeOptions,
};
use crate::pool::{ConcurrencyLimiter, PoolConfig, ResourcePool};
use crate::processing::validation::validate_request;
use crate::utils::{PixelError, PixelResult, WorkerError};
use crate::worker::ManagedWorker;

/// Default ceiling on simultaneous surface-path decodes.
pub const DEFAULT_DECODE_CONCURRENCY: usize = 5;

/// Orchestrates pooled decoding. See the module docs for the layering.
pub struct DecodePipeline<D, S>
where
    D: BitmapDecoder,
    S: RasterSurface + Send + 'static,
{
    decoder: D,
    surfaces: ResourcePool<S>,
    workers: Option<ResourcePool<ManagedWorker>>,
    limiter: ConcurrencyLimiter,
}

impl<D, S> DecodePipeline<D, S>
where
    D: BitmapDecoder,
    S: RasterSurface + Send + 'static,
{
    /// Compose a pipeline from explicitly constructed parts.
    pub fn new(decoder: D, surfaces: ResourcePool<S>, limiter: ConcurrencyLimiter) -> Self {
        Self {
            decoder,
            surfaces,
            workers: None,
            limiter,
        }
    }

    /// Attach a worker pool, enabling the `prefer_worker` path.
    pub fn with_workers(mut self, workers: ResourcePool<ManagedWorker>) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Convenience composition root: default-sized surface pool and
    /// limiter around a surface factory.
    pub fn builder<F>(decoder: D, make_surface: F) -> PixelResult<Self>
    where
        F: Fn() -> PixelResult<S> + Send + Sync + 'static,
    {
        let surfaces = ResourcePool::new(PoolConfig::default(), make_surface, |_| Ok(()))?;
        let limiter = ConcurrencyLimiter::new(DEFAULT_DECODE_CONCURRENCY)?;
        Ok(Self::new(decoder, surfaces, limiter))
    }

    /// Decode one image, optionally resized.
    ///
    /// With `prefer_worker` set and a worker pool attached, the task is
    /// posted off-thread first; any worker failure logs a warning and
    /// falls back to the surface path.
    pub async fn decode(&self, bytes: &[u8], options: DecodeOptions) -> PixelResult<DecodedFrame> {
        validate_request(bytes, options.resize.as_ref())?;

        if options.prefer_worker {
            if let Some(workers) = &self.workers {
                match self.decode_in_worker_inner(workers, bytes, options.resize).await {
                    Ok(frame) => return Ok(frame),
                    Err(err) => {
                        warn!("Worker decode failed, falling back to surface path: {err}");
                    }
                }
            }
        }

        self.decode_on_surface(bytes, options.resize).await
    }

    /// Decode on the calling side using a pooled scratch surface,
    /// gated by the concurrency limiter.
    pub async fn decode_on_surface(
        &self,
        bytes: &[u8],
        resize: Option<ResizeOptions>,
    ) -> PixelResult<DecodedFrame> {
        validate_request(bytes, resize.as_ref())?;
        self.limiter
            .run(async {
                let frame = self.decoder.decode(bytes)?;
                let Some(resize) = resize else {
                    return Ok(frame);
                };

                let rect = calc_resize_rect(frame.width, frame.height, &resize);
                // The canvas is target-sized except when a short-circuit
                // keeps the destination at source size.
                let canvas_w = resize.width.max(rect.dx + rect.dw);
                let canvas_h = resize.height.max(rect.dy + rect.dh);

                let mut surface = self.surfaces.acquire().await?;
                let drawn = draw_frame(&mut *surface, &frame, &rect, canvas_w, canvas_h);
                if let Err(err) = self.surfaces.release(surface).await {
                    warn!("Surface release failed: {err}");
                }
                drawn
            })
            .await?
    }

    /// Decode on a pooled worker thread.
    pub async fn decode_in_worker(
        &self,
        bytes: &[u8],
        resize: Option<ResizeOptions>,
    ) -> PixelResult<DecodedFrame> {
        validate_request(bytes, resize.as_ref())?;
        let workers = self
            .workers
            .as_ref()
            .ok_or_else(|| WorkerError::Dispatch("no worker pool attached".to_string()))?;
        self.decode_in_worker_inner(workers, bytes, resize).await
    }

    async fn decode_in_worker_inner(
        &self,
        workers: &ResourcePool<ManagedWorker>,
        bytes: &[u8],
        resize: Option<ResizeOptions>,
    ) -> PixelResult<DecodedFrame> {
        let worker = workers.acquire().await?;
        let result = worker.post_task(bytes.to_vec(), resize).await;

        // A faulted worker leaves rotation; anything else goes back.
        let put_back = match &result {
            Err(PixelError::Worker(WorkerError::Fault(_) | WorkerError::Terminated)) => {
                workers.retire(worker).await
            }
            _ => workers.release(worker).await,
        };
        if let Err(err) = put_back {
            warn!("Worker return-to-pool failed: {err}");
        }
        result
    }

    /// Decode many images, each through [`decode`](Self::decode). The
    /// limiter keeps the fan-out from oversubscribing the pools.
    pub async fn decode_batch(
        &self,
        inputs: &[Vec<u8>],
        options: DecodeOptions,
    ) -> Vec<PixelResult<DecodedFrame>> {
        debug!(count = inputs.len(), "Decoding batch");
        join_all(inputs.iter().map(|bytes| self.decode(bytes, options))).await
    }

    /// Tear down both pools. The pipeline is unusable afterwards.
    pub async fn dispose(&self) {
        self.surfaces.dispose().await;
        if let Some(workers) = &self.workers {
            workers.dispose().await;
        }
    }
}

/// Resize the scratch canvas, draw one frame through its rects, and read
/// the result back.
fn draw_frame<S: RasterSurface>(
    surface: &mut S,
    frame: &DecodedFrame,
    rect: &crate::core::ResizeRect,
    canvas_w: u32,
    canvas_h: u32,
) -> PixelResult<DecodedFrame> {
    surface.resize(canvas_w, canvas_h)?;
    surface.draw(frame, rect)?;
    surface.read_pixels()
}

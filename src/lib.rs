//! Pooled off-thread image decoding with reference-accurate resize geometry.
//!
//! The crate offloads decode/resize work across a bounded set of reusable
//! execution contexts (off-screen raster surfaces and background worker
//! threads) and computes fit/crop/letterbox geometry matching a
//! reference resizing library. Actual pixel decoding and drawing are
//! host-provided through the [`core::BitmapDecoder`],
//! [`core::RasterSurface`], and [`worker::WorkerBackend`] interfaces.

// Module declarations in dependency order
pub mod core;
pub mod pool;
pub mod processing;
pub mod utils;
pub mod worker;

// Public exports for external consumers
pub use core::{
    calc_resize_rect, BitmapDecoder, DecodeOptions, DecodedFrame, FitMode, RasterSurface,
    ResizeOptions, ResizeRect,
};
pub use pool::{ConcurrencyLimiter, Lease, PoolConfig, PoolStats, ResourcePool};
pub use processing::{DecodePipeline, DEFAULT_DECODE_CONCURRENCY};
pub use utils::{PixelError, PixelResult, PoolError, ValidationError, WorkerError};
pub use worker::{spawn_worker_pool, ManagedWorker, WorkerBackend, WorkerPoolOptions};

//! Error types for the decode pipeline.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Validation errors for decode inputs and resize options.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Resize dimensions must be positive
    #[error("Invalid dimensions: {0}")]
    Dimensions(String),
    /// Unknown fit mode string
    #[error("Invalid fit mode: {0:?}")]
    Fit(String),
    /// Decode payload was empty
    #[error("Empty input payload")]
    EmptyInput,
}

/// Errors raised by the resource pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Invalid pool configuration, raised synchronously at construction
    #[error("Pool configuration error: {0}")]
    Config(String),
    /// The pool was disposed before the call
    #[error("Pool is disposed")]
    Disposed,
    /// The pool was disposed while this waiter was queued
    #[error("Pool cleared")]
    Cleared,
    /// No resource became available within the acquire timeout
    #[error("Pool acquire timeout")]
    AcquireTimeout,
    /// The caller's cancellation signal fired while waiting
    #[error("Pool acquire aborted")]
    Aborted,
    /// Release of a resource the pool never handed out (or already returned)
    #[error("Release of unacquired resource")]
    ReleaseUnacquired,
}

/// Errors raised by a worker dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Task-scoped failure reported by the worker backend
    #[error("Worker task failed: {0}")]
    Task(String),
    /// The whole worker crashed; all in-flight tasks were rejected
    #[error("Worker fault: {0}")]
    Fault(String),
    /// The worker was terminated while tasks were in flight
    #[error("Worker terminated")]
    Terminated,
    /// A response violated the wire protocol (e.g. undersized pixel buffer)
    #[error("Invalid worker response: {0}")]
    InvalidResponse(String),
    /// The request could not be handed to the worker thread
    #[error("Worker dispatch failed: {0}")]
    Dispatch(String),
}

/// Main error type for the decode pipeline.
///
/// All errors in the crate are converted to this type before being
/// returned to the caller.
#[derive(Error, Debug)]
pub enum PixelError {
    /// Input or options validation failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Resource pool error
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// Worker dispatch error
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Bitmap decoding failed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Raster surface operation failed
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Convenience result type for pipeline operations.
pub type PixelResult<T> = Result<T, PixelError>;

// Helper methods for error creation
impl PixelError {
    pub fn decode<T: Into<String>>(msg: T) -> Self {
        Self::Decode(msg.into())
    }

    pub fn surface<T: Into<String>>(msg: T) -> Self {
        Self::Surface(msg.into())
    }
}

impl PoolError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl ValidationError {
    pub fn dimensions(msg: impl Into<String>) -> Self {
        Self::Dimensions(msg.into())
    }
}

// The limiter semaphore is never closed by this crate; surface the
// impossible case as an error rather than unwrapping.
impl From<tokio::sync::AcquireError> for PoolError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        PoolError::Config(format!("Limiter semaphore closed: {err}"))
    }
}

impl From<tokio::sync::AcquireError> for PixelError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        PixelError::Pool(err.into())
    }
}

pub mod error;

pub use error::{PixelError, PixelResult, PoolError, ValidationError, WorkerError};

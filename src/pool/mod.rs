//! Bounded resource pooling and admission control.

mod limiter;
mod resource;

pub use limiter::ConcurrencyLimiter;
pub use resource::{default_pool_size, Lease, PoolConfig, PoolStats, ResourcePool};

mod backend;
mod dispatcher;
mod pool;
mod protocol;

pub use backend::WorkerBackend;
pub use dispatcher::ManagedWorker;
pub use pool::{spawn_worker_pool, WorkerPoolOptions};
pub use protocol::{TaskId, TaskKind, WorkerErrorBody, WorkerRequest, WorkerResponse};

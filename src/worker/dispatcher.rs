//! Request/response dispatch for a single worker thread.
//!
//! A `ManagedWorker` owns one OS thread running a [`WorkerBackend`] and
//! a routing task that correlates responses to pending completion
//! handles by task id. The thread shares nothing with the dispatcher
//! except its two channels; a backend panic unwinds the thread, which
//! closes the response stream and is observed as a whole-worker fault.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::core::{DecodedFrame, ResizeOptions};
use crate::utils::{PixelResult, WorkerError};
use crate::worker::backend::WorkerBackend;
use crate::worker::protocol::{TaskId, TaskKind, WorkerRequest, WorkerResponse};

type Pending = Mutex<HashMap<TaskId, oneshot::Sender<Result<DecodedFrame, WorkerError>>>>;

/// Handle to one worker thread with its own task correlation table.
///
/// The pending map supports any number of outstanding tasks; a pool
/// checking handles out one consumer at a time bounds that to one task
/// per checkout in practice. A faulted or terminated worker refuses new
/// tasks and never resurrects itself; retiring it is the owning pool's
/// job.
pub struct ManagedWorker {
    request_tx: Mutex<Option<crossbeam_channel::Sender<WorkerRequest>>>,
    pending: Arc<Pending>,
    next_id: AtomicU64,
    faulted: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
}

impl ManagedWorker {
    /// Spawn the worker thread and its response router. Must be called
    /// from within a tokio runtime.
    pub fn spawn<B, F>(make_backend: F) -> PixelResult<Self>
    where
        B: WorkerBackend,
        F: FnOnce() -> B + Send + 'static,
    {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();

        std::thread::Builder::new()
            .name("pixelpool-worker".to_string())
            .spawn(move || worker_loop(make_backend(), &request_rx, &response_tx))
            .map_err(|e| WorkerError::Dispatch(format!("Failed to spawn worker thread: {e}")))?;

        let pending: Arc<Pending> = Arc::new(Mutex::new(HashMap::new()));
        let faulted = Arc::new(AtomicBool::new(false));
        let terminated = Arc::new(AtomicBool::new(false));

        tokio::spawn(route_responses(
            response_rx,
            Arc::clone(&pending),
            Arc::clone(&faulted),
            Arc::clone(&terminated),
        ));

        debug!("Spawned managed worker");
        Ok(Self {
            request_tx: Mutex::new(Some(request_tx)),
            pending,
            next_id: AtomicU64::new(0),
            faulted,
            terminated,
        })
    }

    /// Send one task to the worker and await its correlated response.
    pub async fn post_task(
        &self,
        payload: Vec<u8>,
        resize: Option<ResizeOptions>,
    ) -> PixelResult<DecodedFrame> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(WorkerError::Terminated.into());
        }
        if self.faulted.load(Ordering::SeqCst) {
            return Err(WorkerError::Fault("worker previously faulted".to_string()).into());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = WorkerRequest {
            id,
            kind: TaskKind::Decode,
            payload,
            resize,
        };
        let sent = match &*self.request_tx.lock() {
            Some(sender) => sender.send(request).is_ok(),
            None => false,
        };
        if !sent {
            self.pending.lock().remove(&id);
            return Err(WorkerError::Fault("worker is no longer running".to_string()).into());
        }
        trace!(id, "Posted task to worker");

        match rx.await {
            Ok(result) => result.map_err(Into::into),
            // The completion handle vanished without a verdict; only a
            // dead dispatcher does that.
            Err(_) => Err(WorkerError::Fault("worker dispatcher went away".to_string()).into()),
        }
    }

    /// Whether the worker can still accept tasks.
    pub fn is_healthy(&self) -> bool {
        !self.faulted.load(Ordering::SeqCst) && !self.terminated.load(Ordering::SeqCst)
    }

    /// Number of tasks awaiting responses.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Reject every in-flight task and shut the worker thread down.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let entries: Vec<_> = {
            let mut pending = self.pending.lock();
            pending.drain().collect()
        };
        for (id, tx) in entries {
            trace!(id, "Rejecting pending task on terminate");
            let _ = tx.send(Err(WorkerError::Terminated));
        }
        // Dropping the sender ends the worker loop.
        *self.request_tx.lock() = None;
        debug!("Worker terminated");
    }
}

impl Drop for ManagedWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for ManagedWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedWorker")
            .field("healthy", &self.is_healthy())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Body of the worker thread: drain requests, reply per task.
fn worker_loop<B: WorkerBackend>(
    mut backend: B,
    request_rx: &crossbeam_channel::Receiver<WorkerRequest>,
    response_tx: &mpsc::UnboundedSender<WorkerResponse>,
) {
    for request in request_rx {
        let response = match backend.process(&request.payload, request.resize.as_ref()) {
            Ok(frame) => WorkerResponse::Success {
                id: request.id,
                width: frame.width,
                height: frame.height,
                pixels: frame.pixels,
            },
            Err(message) => WorkerResponse::Error {
                id: request.id,
                error: crate::worker::protocol::WorkerErrorBody {
                    message,
                    name: None,
                },
            },
        };
        if response_tx.send(response).is_err() {
            break;
        }
    }
}

/// Routing task: correlate responses until the stream closes, then sweep.
async fn route_responses(
    mut response_rx: mpsc::UnboundedReceiver<WorkerResponse>,
    pending: Arc<Pending>,
    faulted: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
) {
    while let Some(response) = response_rx.recv().await {
        route_one(&pending, response);
    }

    // Stream closed. Orderly terminate already swept the map; anything
    // else means the worker thread died, and no single task can be
    // blamed for that.
    if !terminated.load(Ordering::SeqCst) {
        faulted.store(true, Ordering::SeqCst);
        let entries: Vec<_> = {
            let mut pending = pending.lock();
            pending.drain().collect()
        };
        if !entries.is_empty() {
            warn!(
                rejected = entries.len(),
                "Worker thread exited unexpectedly, rejecting in-flight tasks"
            );
        }
        for (_, tx) in entries {
            let _ = tx.send(Err(WorkerError::Fault(
                "worker thread exited unexpectedly".to_string(),
            )));
        }
    }
}

/// Resolve or reject the pending entry matching one response.
fn route_one(pending: &Pending, response: WorkerResponse) {
    let id = response.id();
    let Some(tx) = pending.lock().remove(&id) else {
        // Stale or duplicate: nobody is waiting on this id anymore.
        trace!(id, "Dropping response with no pending task");
        return;
    };

    let result = match response {
        WorkerResponse::Success {
            width,
            height,
            pixels,
            ..
        } => {
            let frame = DecodedFrame::new(width, height, pixels);
            if frame.is_consistent() {
                Ok(frame)
            } else {
                Err(WorkerError::InvalidResponse(format!(
                    "pixel buffer of {} bytes does not match {}x{}",
                    frame.pixels.len(),
                    width,
                    height
                )))
            }
        }
        WorkerResponse::Error { error, .. } => Err(WorkerError::Task(error.message)),
    };
    let _ = tx.send(result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::PixelError;
    use std::time::Duration;

    /// Decodes "payload" as a 1x1 frame per byte of input; errors on an
    /// empty payload; panics on a payload starting with 0xFF.
    fn test_backend() -> impl WorkerBackend {
        |payload: &[u8], _resize: Option<&ResizeOptions>| {
            if payload.first() == Some(&0xFF) {
                panic!("backend crash requested");
            }
            if payload.is_empty() {
                return Err("empty payload".to_string());
            }
            Ok(DecodedFrame::new(1, 1, vec![payload[0], 0, 0, 255]))
        }
    }

    #[tokio::test]
    async fn post_task_resolves_with_the_decoded_frame() {
        let worker = ManagedWorker::spawn(test_backend).unwrap();
        let frame = worker.post_task(vec![42], None).await.unwrap();
        assert_eq!((frame.width, frame.height), (1, 1));
        assert_eq!(frame.pixels, vec![42, 0, 0, 255]);
        assert_eq!(worker.pending_count(), 0);
    }

    #[tokio::test]
    async fn task_error_rejects_only_that_task() {
        let worker = ManagedWorker::spawn(test_backend).unwrap();

        let failed = worker.post_task(vec![], None).await;
        assert!(matches!(
            failed,
            Err(PixelError::Worker(WorkerError::Task(ref msg))) if msg == "empty payload"
        ));

        // The worker is still healthy and serves the next task.
        assert!(worker.is_healthy());
        let frame = worker.post_task(vec![7], None).await.unwrap();
        assert_eq!(frame.pixels[0], 7);
    }

    #[tokio::test]
    async fn undersized_pixel_buffer_is_a_protocol_violation() {
        let worker = ManagedWorker::spawn(|| {
            |_payload: &[u8], _resize: Option<&ResizeOptions>| {
                // Claims 2x2 but carries a single pixel.
                Ok(DecodedFrame::new(2, 2, vec![0, 0, 0, 255]))
            }
        })
        .unwrap();

        let result = worker.post_task(vec![1], None).await;
        assert!(matches!(
            result,
            Err(PixelError::Worker(WorkerError::InvalidResponse(_)))
        ));
    }

    #[tokio::test]
    async fn fault_rejects_every_in_flight_task() {
        let worker = ManagedWorker::spawn(|| {
            |payload: &[u8], _resize: Option<&ResizeOptions>| {
                // Give the second task time to enqueue, then crash.
                std::thread::sleep(Duration::from_millis(50));
                if payload.first() == Some(&0xFF) {
                    panic!("backend crash requested");
                }
                Ok(DecodedFrame::new(1, 1, vec![0, 0, 0, 255]))
            }
        })
        .unwrap();

        let (first, second) = tokio::join!(
            worker.post_task(vec![0xFF], None),
            worker.post_task(vec![1], None)
        );
        assert!(matches!(
            first,
            Err(PixelError::Worker(WorkerError::Fault(_)))
        ));
        assert!(matches!(
            second,
            Err(PixelError::Worker(WorkerError::Fault(_)))
        ));

        // The dispatcher does not resurrect itself.
        assert!(!worker.is_healthy());
        let after = worker.post_task(vec![1], None).await;
        assert!(matches!(
            after,
            Err(PixelError::Worker(WorkerError::Fault(_)))
        ));
    }

    #[tokio::test]
    async fn terminate_sweeps_pending_tasks() {
        let worker = Arc::new(
            ManagedWorker::spawn(|| {
                |_payload: &[u8], _resize: Option<&ResizeOptions>| {
                    std::thread::sleep(Duration::from_millis(200));
                    Ok(DecodedFrame::new(1, 1, vec![0, 0, 0, 255]))
                }
            })
            .unwrap(),
        );

        let pending = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.post_task(vec![1], None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        worker.terminate();
        let result = pending.await.unwrap();
        // Swept with Terminated unless the backend finished first.
        assert!(matches!(
            result,
            Err(PixelError::Worker(WorkerError::Terminated))
        ));
        assert!(!worker.is_healthy());
    }

    #[tokio::test]
    async fn stale_response_is_dropped_silently() {
        let pending: Arc<Pending> = Arc::new(Mutex::new(HashMap::new()));
        // No entry for id 99: routing must be a quiet no-op.
        route_one(
            &pending,
            WorkerResponse::Success {
                id: 99,
                width: 1,
                height: 1,
                pixels: vec![0, 0, 0, 255],
            },
        );
        assert!(pending.lock().is_empty());
    }

    #[tokio::test]
    async fn task_ids_are_unique_per_dispatcher() {
        let worker = ManagedWorker::spawn(test_backend).unwrap();
        worker.post_task(vec![1], None).await.unwrap();
        worker.post_task(vec![2], None).await.unwrap();
        assert_eq!(worker.next_id.load(Ordering::SeqCst), 2);
    }
}

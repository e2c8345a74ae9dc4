//! The host-provided decode collaborator that runs inside a worker thread.

use crate::core::{DecodedFrame, ResizeOptions};

/// Processes decode tasks on a worker thread.
///
/// One backend instance lives on one worker thread and is never shared;
/// `&mut self` is safe. An `Err` is a task-scoped failure reported back
/// to the caller of that task alone. A panic tears down the whole
/// worker, which rejects every in-flight task on it.
pub trait WorkerBackend: Send + 'static {
    fn process(
        &mut self,
        payload: &[u8],
        resize: Option<&ResizeOptions>,
    ) -> Result<DecodedFrame, String>;
}

impl<F> WorkerBackend for F
where
    F: FnMut(&[u8], Option<&ResizeOptions>) -> Result<DecodedFrame, String> + Send + 'static,
{
    fn process(
        &mut self,
        payload: &[u8],
        resize: Option<&ResizeOptions>,
    ) -> Result<DecodedFrame, String> {
        self(payload, resize)
    }
}

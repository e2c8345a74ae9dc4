//! Generic bounded resource pool with fair waiting.
//!
//! Resources are created lazily up to `max_size` through an injected
//! factory and retired through an injected disposer. Saturated acquires
//! queue as FIFO waiters; a release hands the resource directly to the
//! oldest live waiter without it ever touching the idle list, so a
//! later-arriving acquire can never jump the queue.
//!
//! All pool state lives behind one synchronous mutex with short,
//! non-await critical sections. Waiter handoff (dequeue, re-mark
//! allocated, send) happens entirely under that lock, which is what lets
//! a timing-out waiter distinguish "still queued" from "already served"
//! and recover the resource in the second case.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::utils::{PixelError, PixelResult, PoolError};

/// Configuration for a [`ResourcePool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of live resources (idle + checked out)
    pub max_size: usize,
    /// How long a saturated acquire waits before rejecting
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_pool_size(),
            acquire_timeout: Duration::from_secs(15),
        }
    }
}

impl PoolConfig {
    /// Validate the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_size == 0 {
            return Err(PoolError::config("max_size must be greater than 0"));
        }
        if self.acquire_timeout.is_zero() {
            return Err(PoolError::config("acquire_timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Default pool size: half the CPU cores, at least one.
pub fn default_pool_size() -> usize {
    (num_cpus::get() / 2).max(1)
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Idle resources ready for checkout
    pub available: usize,
    /// Resources currently checked out
    pub allocated: usize,
    /// Queued waiters
    pub waiting: usize,
    /// Total resources ever created
    pub created: u64,
    /// Whether the pool has been disposed
    pub disposed: bool,
}

type Factory<T> = dyn Fn() -> PixelResult<T> + Send + Sync;
type Disposer<T> = dyn Fn(T) -> anyhow::Result<()> + Send + Sync;

struct Waiter<T: Send + 'static> {
    id: u64,
    tx: oneshot::Sender<Lease<T>>,
}

struct PoolState<T: Send + 'static> {
    available: Vec<(u64, T)>,
    allocated: HashSet<u64>,
    waiting: VecDeque<Waiter<T>>,
    next_resource_id: u64,
    next_waiter_id: u64,
    created: u64,
    disposed: bool,
}

struct PoolShared<T: Send + 'static> {
    config: PoolConfig,
    state: Mutex<PoolState<T>>,
    factory: Box<Factory<T>>,
    disposer: Box<Disposer<T>>,
}

/// A checked-out resource.
///
/// Holds the resource value for the duration of the checkout and derefs
/// to it. Return it with [`ResourcePool::release`]; a lease that is
/// simply dropped finds its own way back to the pool, so a cancelled
/// future cannot strand a resource.
pub struct Lease<T: Send + 'static> {
    id: u64,
    value: Option<T>,
    shared: Arc<PoolShared<T>>,
}

impl<T: Send + 'static> Lease<T> {
    fn new(id: u64, value: T, shared: Arc<PoolShared<T>>) -> Self {
        Self {
            id,
            value: Some(value),
            shared,
        }
    }

    /// Pool-assigned id of the underlying resource.
    pub fn id(&self) -> u64 {
        self.id
    }

    fn take_value(&mut self) -> Option<T> {
        self.value.take()
    }
}

impl<T: Send + 'static> std::ops::Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            // The value is only absent after release/drop consumed it,
            // at which point the lease itself no longer exists.
            None => unreachable!("lease dereferenced after release"),
        }
    }
}

impl<T: Send + 'static> std::ops::DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("lease dereferenced after release"),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease").field("id", &self.id).finish()
    }
}

impl<T: Send + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            trace!(id = self.id, "Lease dropped without release, returning resource");
            let _ = PoolShared::return_value(&self.shared, self.id, value);
        }
    }
}

/// Generic bounded resource pool.
///
/// Cloning is cheap and clones share the same underlying pool.
pub struct ResourcePool<T: Send + 'static> {
    shared: Arc<PoolShared<T>>,
}

impl<T: Send + 'static> Clone for ResourcePool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: Send + 'static> ResourcePool<T> {
    /// Create a pool. The factory builds resources lazily on demand; the
    /// disposer retires them on [`dispose`](Self::dispose) or on a
    /// post-disposal release. Configuration errors surface here, not at
    /// first acquire.
    pub fn new<F, D>(config: PoolConfig, factory: F, disposer: D) -> PixelResult<Self>
    where
        F: Fn() -> PixelResult<T> + Send + Sync + 'static,
        D: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        config.validate()?;
        debug!(
            max_size = config.max_size,
            timeout_ms = config.acquire_timeout.as_millis() as u64,
            "Creating resource pool"
        );
        Ok(Self {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(PoolState {
                    available: Vec::new(),
                    allocated: HashSet::new(),
                    waiting: VecDeque::new(),
                    next_resource_id: 0,
                    next_waiter_id: 0,
                    created: 0,
                    disposed: false,
                }),
                factory: Box::new(factory),
                disposer: Box::new(disposer),
            }),
        })
    }

    /// Acquire a resource, waiting (bounded by the configured timeout)
    /// when the pool is saturated.
    pub async fn acquire(&self) -> PixelResult<Lease<T>> {
        self.acquire_inner(None).await
    }

    /// Like [`acquire`](Self::acquire), with an external cancellation
    /// signal. Cancelling removes exactly this waiter; other queued
    /// waiters are untouched.
    pub async fn acquire_with_signal(&self, signal: &CancellationToken) -> PixelResult<Lease<T>> {
        self.acquire_inner(Some(signal)).await
    }

    async fn acquire_inner(&self, signal: Option<&CancellationToken>) -> PixelResult<Lease<T>> {
        if let Some(signal) = signal {
            if signal.is_cancelled() {
                return Err(PoolError::Aborted.into());
            }
        }

        let (waiter_id, mut rx) = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return Err(PoolError::Disposed.into());
            }

            if let Some((id, value)) = state.available.pop() {
                state.allocated.insert(id);
                trace!(id, "Acquired idle resource");
                return Ok(Lease::new(id, value, Arc::clone(&self.shared)));
            }

            if state.available.len() + state.allocated.len() < self.shared.config.max_size {
                let value = (self.shared.factory)()?;
                let id = state.next_resource_id;
                state.next_resource_id += 1;
                state.created += 1;
                state.allocated.insert(id);
                debug!(id, total = state.created, "Created pool resource");
                return Ok(Lease::new(id, value, Arc::clone(&self.shared)));
            }

            let waiter_id = state.next_waiter_id;
            state.next_waiter_id += 1;
            let (tx, rx) = oneshot::channel();
            state.waiting.push_back(Waiter { id: waiter_id, tx });
            trace!(waiter_id, queued = state.waiting.len(), "Pool saturated, queued waiter");
            (waiter_id, rx)
        };

        let cancelled = async {
            match signal {
                Some(signal) => signal.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            result = &mut rx => match result {
                Ok(lease) => Ok(lease),
                // The pool dropped our sender during a disposal sweep.
                Err(_) => Err(PoolError::Cleared.into()),
            },
            () = cancelled => self.abandon_waiter(waiter_id, &mut rx, PoolError::Aborted),
            () = tokio::time::sleep(self.shared.config.acquire_timeout) => {
                self.abandon_waiter(waiter_id, &mut rx, PoolError::AcquireTimeout)
            }
        }
    }

    /// Remove this waiter after its timer or cancellation signal fired.
    /// If the handoff already happened, route the resource back so no
    /// other waiter is starved by our departure.
    fn abandon_waiter(
        &self,
        waiter_id: u64,
        rx: &mut oneshot::Receiver<Lease<T>>,
        error: PoolError,
    ) -> PixelResult<Lease<T>> {
        {
            let mut state = self.shared.state.lock();
            if let Some(position) = state.waiting.iter().position(|w| w.id == waiter_id) {
                state.waiting.remove(position);
                trace!(waiter_id, %error, "Removed queued waiter");
                return Err(error.into());
            }
        }

        match rx.try_recv() {
            Ok(mut lease) => {
                // Served in the same instant the timer fired; give the
                // resource back through the normal release path.
                let id = lease.id;
                if let Some(value) = lease.take_value() {
                    let _ = PoolShared::return_value(&self.shared, id, value);
                }
                Err(error.into())
            }
            Err(oneshot::error::TryRecvError::Closed) => Err(PoolError::Cleared.into()),
            Err(oneshot::error::TryRecvError::Empty) => Err(error.into()),
        }
    }

    /// Return a checked-out resource.
    ///
    /// Releasing a lease that did not come from this pool is a
    /// programmer error, unless the pool is disposed, in which case the
    /// resource is silently retired (post-disposal races must not fail).
    pub async fn release(&self, mut lease: Lease<T>) -> PixelResult<()> {
        if !Arc::ptr_eq(&lease.shared, &self.shared) {
            if self.shared.state.lock().disposed {
                // Lease::drop will route it back to its own pool.
                return Ok(());
            }
            return Err(PoolError::ReleaseUnacquired.into());
        }
        let id = lease.id;
        match lease.take_value() {
            Some(value) => PoolShared::return_value(&self.shared, id, value),
            None => Err(PoolError::ReleaseUnacquired.into()),
        }
    }

    /// Retire a checked-out resource instead of returning it: the
    /// disposer runs, capacity is freed, and queued waiters are served
    /// with factory-fresh replacements. For resources that became
    /// unusable while on lease (e.g. a faulted worker).
    pub async fn retire(&self, mut lease: Lease<T>) -> PixelResult<()> {
        if !Arc::ptr_eq(&lease.shared, &self.shared) {
            return Err(PoolError::ReleaseUnacquired.into());
        }
        let id = lease.id;
        let Some(value) = lease.take_value() else {
            return Err(PoolError::ReleaseUnacquired.into());
        };

        {
            let mut state = self.shared.state.lock();
            if state.disposed {
                state.allocated.remove(&id);
            } else {
                if !state.allocated.remove(&id) {
                    return Err(PoolError::ReleaseUnacquired.into());
                }
                debug!(id, "Retiring pool resource");
                self.backfill_waiters(&mut state);
            }
        }
        self.shared.safe_dispose(id, value);
        Ok(())
    }

    /// Serve queued waiters with newly created resources while capacity
    /// allows. Factory failures are logged and leave remaining waiters
    /// to their own timeouts.
    fn backfill_waiters(&self, state: &mut PoolState<T>) {
        while !state.waiting.is_empty()
            && state.available.len() + state.allocated.len() < self.shared.config.max_size
        {
            let value = match (self.shared.factory)() {
                Ok(value) => value,
                Err(err) => {
                    warn!("Failed to create replacement resource: {err}");
                    return;
                }
            };
            let id = state.next_resource_id;
            state.next_resource_id += 1;
            state.created += 1;

            let mut slot = Some(value);
            let mut delivered = false;
            while let Some(waiter) = state.waiting.pop_front() {
                state.allocated.insert(id);
                let lease = Lease::new(id, slot.take().unwrap(), Arc::clone(&self.shared));
                match waiter.tx.send(lease) {
                    Ok(()) => {
                        delivered = true;
                        break;
                    }
                    Err(mut lease) => {
                        state.allocated.remove(&id);
                        match lease.take_value() {
                            Some(reclaimed) => slot = Some(reclaimed),
                            None => return,
                        }
                    }
                }
            }
            if !delivered {
                state.available.push((id, slot.unwrap()));
                return;
            }
        }
    }

    /// Dispose the pool: reject every queued waiter, retire idle
    /// resources, and refuse all future acquires. Idempotent; never
    /// fails. Resources currently checked out are retired when their
    /// holders release (or drop) them.
    pub async fn dispose(&self) {
        let (waiters, resources) = {
            let mut state = self.shared.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            let waiters: Vec<_> = state.waiting.drain(..).collect();
            let resources: Vec<_> = state.available.drain(..).collect();
            (waiters, resources)
        };

        debug!(
            waiters = waiters.len(),
            resources = resources.len(),
            "Disposing pool"
        );
        // Dropping the senders rejects every waiter with `Cleared`.
        drop(waiters);
        for (id, value) in resources {
            self.shared.safe_dispose(id, value);
        }
    }

    /// Current pool counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            available: state.available.len(),
            allocated: state.allocated.len(),
            waiting: state.waiting.len(),
            created: state.created,
            disposed: state.disposed,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().disposed
    }

    /// Acquire a resource, run `f` on the lease, and return it to the
    /// pool when the produced future finishes or is dropped.
    pub async fn with_resource<R, F, Fut>(&self, f: F) -> PixelResult<R>
    where
        F: FnOnce(Lease<T>) -> Fut,
        Fut: Future<Output = PixelResult<R>>,
    {
        let lease = self.acquire().await?;
        f(lease).await
    }
}

impl<T: Send + 'static> PoolShared<T> {
    /// Put a resource back: hand it to the oldest live waiter, or park it
    /// as idle. Called from explicit release and from `Lease::drop`.
    fn return_value(shared: &Arc<Self>, id: u64, value: T) -> PixelResult<()> {
        let mut state = shared.state.lock();
        if state.disposed {
            state.allocated.remove(&id);
            drop(state);
            shared.safe_dispose(id, value);
            return Ok(());
        }
        if !state.allocated.remove(&id) {
            return Err(PoolError::ReleaseUnacquired.into());
        }

        let mut value = value;
        while let Some(waiter) = state.waiting.pop_front() {
            state.allocated.insert(id);
            match waiter.tx.send(Lease::new(id, value, Arc::clone(shared))) {
                Ok(()) => {
                    trace!(id, waiter_id = waiter.id, "Handed resource to queued waiter");
                    return Ok(());
                }
                Err(mut lease) => {
                    // Waiter future was dropped before the handoff; take
                    // the value back out and try the next in line.
                    state.allocated.remove(&id);
                    match lease.take_value() {
                        Some(reclaimed) => value = reclaimed,
                        None => return Ok(()),
                    }
                }
            }
        }

        state.available.push((id, value));
        trace!(id, idle = state.available.len(), "Returned resource to idle list");
        Ok(())
    }

    fn safe_dispose(&self, id: u64, value: T) {
        if let Err(err) = (self.disposer)(value) {
            warn!(id, "Error during resource disposal: {err:#}");
        }
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    error::{PoolError, Result},
    timer::{Timer, TimerEntry},
};

/// State shared between the pool, its handles, its timers, and the worker.
pub(crate) struct Shared {
    /// The registry. Insertion-ordered, never shrinks: the pool keeps one
    /// strong reference to every timer ever created.
    timers: Mutex<Vec<Arc<dyn TimerEntry>>>,
    /// Early-wake signal for the worker. `notify_one` stores a permit when
    /// the worker is mid-scan, so a wake issued between scan and wait is
    /// never lost.
    pub(crate) wake: Notify,
    /// Shutdown flag, false until `stop()`. Monotonic: never reset.
    shutdown: watch::Sender<bool>,
    next_id: AtomicU64,
}

/// Cheaply cloneable handle for registering timers while the worker runs.
///
/// This is also the back-reference handed to [`TimerEntry::fire`], so a
/// firing timer can create further timers without deadlocking — the worker
/// releases the registry lock before firing.
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    /// Register a new unarmed [`Timer`] and return a shared handle to it.
    ///
    /// The pool holds one strong reference forever; the returned `Arc` is
    /// the caller's. Never fails. The worker is woken so the new timer is
    /// picked up on the next scan.
    pub fn create_timer(&self) -> Arc<Timer> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let timer = Arc::new(Timer::new(id, Arc::downgrade(&self.shared)));
        self.add_entry(timer.clone());
        debug!(timer_id = id, "timer created");
        timer
    }

    /// Register a caller-supplied [`TimerEntry`] implementation.
    pub fn add_entry(&self, entry: Arc<dyn TimerEntry>) {
        let total = {
            let mut timers = self.shared.timers.lock().unwrap();
            timers.push(entry);
            timers.len()
        };
        debug!(total, "timer registered");
        // The new entry may be due sooner than the worker's current sleep
        // target; wake it to recompute.
        self.shared.wake.notify_one();
    }

    /// Request orderly shutdown. Non-blocking and idempotent: the worker
    /// exits after completing any in-flight scan and fire batch.
    pub fn stop(&self) {
        let _ = self.shared.shutdown.send(true);
        self.shared.wake.notify_one();
    }

    /// Number of registered timers (armed or not).
    pub fn timer_count(&self) -> usize {
        self.shared.timers.lock().unwrap().len()
    }
}

/// A pool of timers driven by one dedicated worker task.
///
/// The worker scans the registry, fires every due timer, then sleeps until
/// the earliest remaining expiry — there is no fixed tick. Registering or
/// arming a timer wakes it early so a deadline sooner than the current sleep
/// target is never missed.
pub struct TimerPool {
    handle: PoolHandle,
    worker: JoinHandle<()>,
}

impl TimerPool {
    /// Create a pool and start its worker immediately.
    ///
    /// Must be called from within a tokio runtime; panics otherwise (the
    /// worker is spawned on the ambient runtime).
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            timers: Mutex::new(Vec::new()),
            wake: Notify::new(),
            shutdown: shutdown_tx,
            next_id: AtomicU64::new(1),
        });
        let handle = PoolHandle { shared };
        let worker = tokio::spawn(run(handle.clone(), shutdown_rx));
        Self { handle, worker }
    }

    /// A cloneable registration handle, independent of the pool's lifetime
    /// guarantees (a handle outliving the pool can still configure timers,
    /// but nothing will fire them).
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// See [`PoolHandle::create_timer`].
    pub fn create_timer(&self) -> Arc<Timer> {
        self.handle.create_timer()
    }

    /// See [`PoolHandle::add_entry`].
    pub fn add_entry(&self, entry: Arc<dyn TimerEntry>) {
        self.handle.add_entry(entry)
    }

    /// See [`PoolHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop()
    }

    /// Stop the pool and wait for the worker to exit.
    ///
    /// On return no further timer fires. Surfaces a worker panic as
    /// [`PoolError::Worker`].
    pub async fn shutdown(mut self) -> Result<()> {
        self.handle.stop();
        (&mut self.worker)
            .await
            .map_err(|e| PoolError::Worker(e.to_string()))
    }
}

impl Default for TimerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerPool {
    fn drop(&mut self) {
        // A pool dropped without `shutdown()` must not keep firing timers.
        // Abort is a no-op if the worker already exited.
        self.handle.stop();
        self.worker.abort();
    }
}

/// Main worker loop.
///
/// Each iteration scans the registry once under the lock, partitioning
/// entries into a due batch and the minimum future expiry (the wake target).
/// The lock is released before firing, so `fire` bodies may call back into
/// the pool. After a non-empty batch the loop rescans immediately: a fired
/// timer may have re-armed itself to a deadline earlier than the wake target
/// computed before the batch ran.
async fn run(handle: PoolHandle, mut shutdown: watch::Receiver<bool>) {
    info!("timer pool worker started");

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let now = Instant::now();
        let mut due: Vec<Arc<dyn TimerEntry>> = Vec::new();
        let mut wake_at: Option<Instant> = None;
        {
            let timers = handle.shared.timers.lock().unwrap();
            for entry in timers.iter() {
                match entry.next_expiry() {
                    Some(at) if at <= now => due.push(Arc::clone(entry)),
                    Some(at) => wake_at = Some(wake_at.map_or(at, |w| w.min(at))),
                    None => {}
                }
            }
        }

        if !due.is_empty() {
            for entry in due {
                entry.fire(&handle);
            }
            continue;
        }

        // Sleep until the wake target (forever when nothing is pending), a
        // registration/arming wake, or shutdown.
        tokio::select! {
            _ = handle.shared.wake.notified() => {}
            _ = shutdown.changed() => {}
            _ = async {
                match wake_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => {}
        }
    }

    info!("timer pool worker stopped");
}

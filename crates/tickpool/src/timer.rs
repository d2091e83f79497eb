use std::sync::{Mutex, Weak};

use tokio::time::Instant;
use tracing::debug;

use crate::{
    engine::{PoolHandle, Shared},
    error::{PoolError, Result},
    schedule::Schedule,
};

/// Contract between the pool's worker and anything it schedules.
///
/// Implementations must keep both methods cheap and lock-free with respect
/// to the pool: `next_expiry` is polled on every scan and must not block or
/// call back into the pool; `fire` runs on the worker with the registry lock
/// released, so it *may* register further timers via the supplied handle,
/// but a `fire` that never returns will stall every other timer and block
/// shutdown.
pub trait TimerEntry: Send + Sync {
    /// The instant at which this entry next becomes due, or `None` while it
    /// is inert. Queried once per scan; must not mutate scheduling state.
    fn next_expiry(&self) -> Option<Instant>;

    /// Execute the entry's due action. Invoked at (or after) the expiry
    /// returned by the preceding `next_expiry` call, exactly once per scan
    /// in which the entry was found due.
    fn fire(&self, pool: &PoolHandle);
}

type FireFn = Box<dyn FnMut(&PoolHandle) + Send>;

struct TimerState {
    schedule: Option<Schedule>,
    deadline: Option<Instant>,
    callback: Option<FireFn>,
    fires: u64,
}

/// The built-in configurable timer returned by [`PoolHandle::create_timer`].
///
/// Created unarmed: it reports no expiry until [`arm`](Timer::arm) installs
/// a [`Schedule`]. The pool's registry and the caller's handle share
/// ownership; the timer lives as long as either does.
pub struct Timer {
    id: u64,
    /// Back-reference to the owning pool, used to wake the worker when
    /// arming shortens its sleep target. Weak so registry → timer → pool
    /// does not form a cycle.
    pool: Weak<Shared>,
    state: Mutex<TimerState>,
}

impl Timer {
    pub(crate) fn new(id: u64, pool: Weak<Shared>) -> Self {
        Self {
            id,
            pool,
            state: Mutex::new(TimerState {
                schedule: None,
                deadline: None,
                callback: None,
                fires: 0,
            }),
        }
    }

    /// Pool-unique identifier, allocated at creation. Used in log fields.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Set (or replace) the action executed when the timer fires.
    ///
    /// The callback runs on the worker task and receives the pool handle so
    /// it can create further timers. It is taken out of the timer for the
    /// duration of the call, so it may re-arm or reconfigure its own timer
    /// without deadlocking.
    pub fn on_fire<F>(&self, callback: F)
    where
        F: FnMut(&PoolHandle) + Send + 'static,
    {
        self.state.lock().unwrap().callback = Some(Box::new(callback));
    }

    /// Install `schedule` and start counting down.
    ///
    /// Re-arming an already armed timer replaces its schedule. The worker is
    /// woken in case the new deadline precedes its current sleep target.
    pub fn arm(&self, schedule: Schedule) -> Result<()> {
        if let Schedule::Every { period } = schedule {
            if period.is_zero() {
                return Err(PoolError::InvalidSchedule(
                    "repeating period must be non-zero".into(),
                ));
            }
        }

        let deadline = schedule.first_deadline(Instant::now());
        {
            let mut state = self.state.lock().unwrap();
            state.schedule = Some(schedule);
            state.deadline = Some(deadline);
        }
        debug!(timer_id = self.id, "timer armed");

        if let Some(shared) = self.pool.upgrade() {
            shared.wake.notify_one();
        }
        Ok(())
    }

    /// Clear the schedule. The timer stays registered but reports no expiry
    /// until armed again; its callback is kept.
    pub fn disarm(&self) {
        let mut state = self.state.lock().unwrap();
        state.schedule = None;
        state.deadline = None;
    }

    /// True while a schedule is installed and a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.state.lock().unwrap().deadline.is_some()
    }

    /// Number of completed fires.
    pub fn fire_count(&self) -> u64 {
        self.state.lock().unwrap().fires
    }
}

impl TimerEntry for Timer {
    fn next_expiry(&self) -> Option<Instant> {
        self.state.lock().unwrap().deadline
    }

    fn fire(&self, pool: &PoolHandle) {
        // Advance the deadline before running the callback: a repeating
        // schedule re-arms from fire time, a one-shot exhausts. Done first
        // so the callback observes (and may override) the new state.
        let (callback, fires) = {
            let mut state = self.state.lock().unwrap();
            let now = Instant::now();
            state.deadline = state.schedule.as_ref().and_then(|s| s.next_deadline(now));
            if state.deadline.is_none() {
                state.schedule = None;
            }
            state.fires += 1;
            (state.callback.take(), state.fires)
        };

        debug!(timer_id = self.id, fires, "timer fired");

        let Some(mut callback) = callback else {
            return;
        };
        callback(pool);

        // Restore the callback unless the timer installed a replacement
        // while it was out.
        let mut state = self.state.lock().unwrap();
        if state.callback.is_none() {
            state.callback = Some(callback);
        }
    }
}

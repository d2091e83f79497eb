use std::time::Duration;

use tokio::time::Instant;

/// Defines when and how often a timer should fire.
///
/// All variants are anchored to the monotonic clock (`tokio::time::Instant`);
/// wall-clock schedules are deliberately absent — a clock that can be
/// adjusted backwards would fire timers early or late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fire exactly once at the given instant.
    Once { at: Instant },

    /// Fire exactly once, one delay after arming.
    After { delay: Duration },

    /// Fire repeatedly with a fixed period, measured from each fire.
    Every { period: Duration },
}

impl Schedule {
    /// Resolve the deadline installed when a timer is armed at `now`.
    ///
    /// A `Once` instant that has already passed (or a zero `After` delay)
    /// resolves to `now`, so the timer fires on the worker's next scan
    /// rather than never.
    pub fn first_deadline(&self, now: Instant) -> Instant {
        match self {
            Schedule::Once { at } => (*at).max(now),
            Schedule::After { delay } => now + *delay,
            Schedule::Every { period } => now + *period,
        }
    }

    /// Resolve the deadline after a fire at `now`.
    ///
    /// Returns `None` when the schedule is exhausted (`Once` and `After`
    /// fire a single time).
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        match self {
            Schedule::Once { .. } | Schedule::After { .. } => None,
            Schedule::Every { period } => Some(now + *period),
        }
    }

    /// True for schedules that fire more than once.
    pub fn is_repeating(&self) -> bool {
        matches!(self, Schedule::Every { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_future_keeps_its_instant() {
        let now = Instant::now();
        let at = now + Duration::from_secs(5);
        assert_eq!(Schedule::Once { at }.first_deadline(now), at);
    }

    #[test]
    fn once_past_clamps_to_now() {
        let at = Instant::now();
        let now = at + Duration::from_secs(5);
        assert_eq!(Schedule::Once { at }.first_deadline(now), now);
    }

    #[test]
    fn after_offsets_from_arming() {
        let now = Instant::now();
        let sched = Schedule::After {
            delay: Duration::from_millis(250),
        };
        assert_eq!(sched.first_deadline(now), now + Duration::from_millis(250));
    }

    #[test]
    fn one_shot_schedules_exhaust() {
        let now = Instant::now();
        assert!(Schedule::Once { at: now }.next_deadline(now).is_none());
        assert!(Schedule::After {
            delay: Duration::from_secs(1)
        }
        .next_deadline(now)
        .is_none());
    }

    #[test]
    fn every_advances_from_fire_time() {
        let now = Instant::now();
        let sched = Schedule::Every {
            period: Duration::from_secs(30),
        };
        assert_eq!(
            sched.next_deadline(now),
            Some(now + Duration::from_secs(30))
        );
        assert!(sched.is_repeating());
    }
}

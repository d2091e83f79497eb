//! `tickpool` — single-worker timer pool over the monotonic clock.
//!
//! # Overview
//!
//! A [`TimerPool`] owns a dynamic registry of timers and one dedicated
//! worker task. Each cycle the worker scans the registry, fires every timer
//! whose expiry has passed, then sleeps until the earliest remaining expiry.
//! There is no fixed tick and no busy polling: the sleep duration is
//! computed each cycle, and registering, arming, or stopping wakes the
//! worker early so a change that shortens the sleep target takes effect
//! immediately.
//!
//! Timers fire sequentially on the worker, never in parallel. The worker
//! releases the registry lock before firing, so a fire callback may create
//! further timers through the [`PoolHandle`] it receives.
//!
//! # Schedule variants
//!
//! | Variant | Behaviour                                           |
//! |---------|-----------------------------------------------------|
//! | `Once`  | Single fire at an absolute instant                  |
//! | `After` | Single fire one delay after arming                  |
//! | `Every` | Repeat with a fixed period, measured from fire time |

pub mod engine;
pub mod error;
pub mod schedule;
pub mod timer;

pub use engine::{PoolHandle, TimerPool};
pub use error::{PoolError, Result};
pub use schedule::Schedule;
pub use timer::{Timer, TimerEntry};

//! Interval timer: elapsed/paused time accounting plus a periodic callback.
//!
//! ## Implementations
//!
//! - [`TokioIntervalTimer`]: real clock, callbacks from a tokio task
//! - [`ManualIntervalTimer`]: virtual clock, callbacks fire inside `advance()`
//!
//! ## Call sequence
//!
//! ```text
//! Idle    --reset_start_time + start-->        Running
//! Running --reset_pause_time + reset-->        Paused
//! Paused  --update_paused_time + start-->      Running
//! any     --reset-->                           Idle
//! ```
//!
//! The timer does not check that sequence itself. [`TimerController`] does.

mod controller;
mod manual;
mod stopwatch;
mod tokio_timer;

use std::time::Duration;

pub use controller::{TickHook, TimerController, TimerState};
pub use manual::ManualIntervalTimer;
pub use stopwatch::Stopwatch;
pub use tokio_timer::TokioIntervalTimer;

/// Reference tick cadence.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Work invoked on every tick.
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// A periodic scheduler that also reports elapsed and paused durations.
///
/// Nothing here fails. Calling the time methods out of order gives
/// meaningless (but saturated, never negative) durations.
pub trait IntervalTimer: Send + Sync {
    /// Timestamps backing the time accounting methods.
    fn stopwatch(&self) -> &Stopwatch;

    /// Tick cadence.
    fn period(&self) -> Duration;

    /// Begin invoking `callback` every period, first call at time zero.
    ///
    /// Fixed-rate: tick `n` is due at `origin + n * period` regardless of
    /// how long earlier callbacks took. Replaces any active schedule.
    fn start(&self, callback: TickCallback);

    /// Cancel the active schedule, if any. Best-effort: a callback that is
    /// already running is not waited for.
    fn reset(&self);

    /// Whether a schedule is active.
    fn is_armed(&self) -> bool;

    /// `now - start_time`, in milliseconds.
    fn elapsed_ms(&self) -> u64 {
        self.stopwatch().elapsed_ms()
    }

    /// `start_time = now`.
    fn reset_start_time(&self) {
        self.stopwatch().reset_start_time()
    }

    /// `pause_time = now`. Marks entry into a pause.
    fn reset_pause_time(&self) {
        self.stopwatch().reset_pause_time()
    }

    /// `start_time += now - pause_time`. Call once per pause/resume cycle.
    fn update_paused_time(&self) {
        self.stopwatch().update_paused_time()
    }

    /// `pause_time - start_time`: the elapsed time at the moment the pause
    /// began, not the length of the pause.
    fn paused_ms(&self) -> u64 {
        self.stopwatch().paused_ms()
    }
}

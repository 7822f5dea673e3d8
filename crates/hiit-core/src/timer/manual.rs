use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{IntervalTimer, Stopwatch, TickCallback};
use crate::clock::{Clock, ManualClock};

struct Armed {
    callback: TickCallback,
    next_due_ms: u64,
}

/// Interval timer on a virtual clock.
///
/// Time only moves when [`advance`](Self::advance) is called, and due
/// callbacks run there, each with the clock set to its exact due instant.
/// Callbacks may call `start`/`reset` on the timer they belong to.
pub struct ManualIntervalTimer {
    clock: ManualClock,
    stopwatch: Stopwatch,
    period_ms: u64,
    armed: Mutex<Option<Armed>>,
    /// Bumped by every `start`/`reset` so a callback that re-arms or
    /// cancels from inside itself is not clobbered afterwards.
    generation: AtomicU64,
}

impl ManualIntervalTimer {
    /// New timer on a fresh clock reading zero.
    pub fn new(period: Duration) -> Self {
        Self::with_clock(ManualClock::new(0), period)
    }

    pub fn with_clock(clock: ManualClock, period: Duration) -> Self {
        Self {
            stopwatch: Stopwatch::new(Arc::new(clock.clone())),
            clock,
            period_ms: millis(period).max(1),
            armed: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Move time forward by `by`, firing every tick that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.now_ms().saturating_add(millis(by));
        while let Some(due) = self.next_due_ms().filter(|due| *due <= target) {
            self.clock.set_ms(due);
            self.fire_once();
        }
        self.clock.set_ms(target);
    }

    /// Fire anything due at the current instant without moving time.
    pub fn run_due(&self) {
        self.advance(Duration::ZERO);
    }

    fn next_due_ms(&self) -> Option<u64> {
        self.armed().as_ref().map(|a| a.next_due_ms)
    }

    fn fire_once(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        // The slot is released while the callback runs.
        let Some(mut armed) = self.armed().take() else {
            return;
        };
        (armed.callback)();
        // A schedule that runs past the end of the clock is done.
        let Some(next_due_ms) = armed.next_due_ms.checked_add(self.period_ms) else {
            return;
        };
        armed.next_due_ms = next_due_ms;

        let mut slot = self.armed();
        if slot.is_none() && self.generation.load(Ordering::SeqCst) == generation {
            *slot = Some(armed);
        }
    }

    fn armed(&self) -> MutexGuard<'_, Option<Armed>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl IntervalTimer for ManualIntervalTimer {
    fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    fn start(&self, callback: TickCallback) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.armed() = Some(Armed {
            callback,
            next_due_ms: self.now_ms(),
        });
    }

    fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.armed().take();
    }

    fn is_armed(&self) -> bool {
        self.armed().is_some()
    }
}

impl std::fmt::Debug for ManualIntervalTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualIntervalTimer")
            .field("now_ms", &self.now_ms())
            .field("period_ms", &self.period_ms)
            .field("next_due_ms", &self.next_due_ms())
            .field("stopwatch", &self.stopwatch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::DEFAULT_PERIOD;
    use std::sync::atomic::AtomicUsize;

    fn recorder(timer: &Arc<ManualIntervalTimer>) -> (Arc<Mutex<Vec<u64>>>, TickCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let t = Arc::clone(timer);
        (
            seen,
            Box::new(move || s.lock().unwrap().push(t.now_ms())),
        )
    }

    #[test]
    fn ticks_are_anchored_to_start() {
        let timer = Arc::new(ManualIntervalTimer::new(DEFAULT_PERIOD));
        timer.advance(Duration::from_millis(30));
        let (seen, cb) = recorder(&timer);
        timer.start(cb);

        timer.advance(Duration::from_millis(45));
        timer.advance(Duration::from_millis(200));
        assert_eq!(*seen.lock().unwrap(), vec![30, 130, 230]);
        assert_eq!(timer.now_ms(), 275);
    }

    #[test]
    fn nothing_fires_until_driven() {
        let timer = Arc::new(ManualIntervalTimer::new(DEFAULT_PERIOD));
        let (seen, cb) = recorder(&timer);
        timer.start(cb);
        assert!(seen.lock().unwrap().is_empty());
        timer.run_due();
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn reset_from_inside_callback_sticks() {
        let timer = Arc::new(ManualIntervalTimer::new(DEFAULT_PERIOD));
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let t = Arc::clone(&timer);
        timer.start(Box::new(move || {
            if c.fetch_add(1, Ordering::SeqCst) == 2 {
                t.reset();
            }
        }));

        timer.advance(Duration::from_secs(5));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!timer.is_armed());
    }

    #[test]
    fn restart_from_inside_callback_replaces_schedule() {
        let timer = Arc::new(ManualIntervalTimer::new(DEFAULT_PERIOD));
        let (seen, cb) = recorder(&timer);
        let replacement = Mutex::new(Some(cb));
        let t = Arc::clone(&timer);
        timer.advance(Duration::from_millis(10));
        timer.start(Box::new(move || {
            if let Some(cb) = replacement.lock().unwrap().take() {
                t.clock().advance_ms(5);
                t.start(cb);
            }
        }));

        timer.advance(Duration::from_millis(300));
        assert_eq!(*seen.lock().unwrap(), vec![15, 115, 215]);
    }

    #[test]
    fn huge_advance_saturates_the_clock() {
        let timer = ManualIntervalTimer::new(DEFAULT_PERIOD);
        timer.advance(Duration::from_millis(40));
        timer.advance(Duration::MAX);
        assert_eq!(timer.now_ms(), u64::MAX);
    }

    #[test]
    fn huge_period_ends_at_the_clock_limit() {
        let timer = Arc::new(ManualIntervalTimer::new(Duration::MAX));
        assert_eq!(timer.period(), Duration::from_millis(u64::MAX));
        let (seen, cb) = recorder(&timer);
        timer.start(cb);

        timer.advance(Duration::from_secs(10));
        assert_eq!(*seen.lock().unwrap(), vec![0]);
        timer.advance(Duration::MAX);
        assert_eq!(*seen.lock().unwrap(), vec![0, u64::MAX]);
        assert!(!timer.is_armed());
    }
}

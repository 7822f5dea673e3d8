use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;

/// Start/pause timestamps shared by every [`IntervalTimer`] implementation.
///
/// Both timestamps are single atomic scalars: the owning timer is the only
/// writer, and readers on other threads never observe a torn value.
/// Out-of-order calls saturate instead of panicking.
///
/// [`IntervalTimer`]: super::IntervalTimer
pub struct Stopwatch {
    clock: Arc<dyn Clock>,
    start_ms: AtomicU64,
    pause_ms: AtomicU64,
}

impl Stopwatch {
    /// `start = now`, `pause = 0`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            clock,
            start_ms: AtomicU64::new(now),
            pause_ms: AtomicU64::new(0),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms.load(Ordering::Acquire)
    }

    pub fn pause_ms(&self) -> u64 {
        self.pause_ms.load(Ordering::Acquire)
    }

    /// `now - start`.
    pub fn elapsed_ms(&self) -> u64 {
        self.now_ms().saturating_sub(self.start_ms())
    }

    pub fn reset_start_time(&self) {
        self.start_ms.store(self.now_ms(), Ordering::Release);
    }

    pub fn reset_pause_time(&self) {
        self.pause_ms.store(self.now_ms(), Ordering::Release);
    }

    /// Shift `start` forward by the time spent since `reset_pause_time`.
    pub fn update_paused_time(&self) {
        let paused_for = self.now_ms().saturating_sub(self.pause_ms());
        // Only error is "closure returned None", which never happens here.
        let _ = self
            .start_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |start| {
                Some(start.saturating_add(paused_for))
            });
    }

    /// `pause - start`: how much had elapsed when the pause began.
    pub fn paused_ms(&self) -> u64 {
        self.pause_ms().saturating_sub(self.start_ms())
    }
}

impl fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stopwatch")
            .field("start_ms", &self.start_ms())
            .field("pause_ms", &self.pause_ms())
            .finish()
    }
}

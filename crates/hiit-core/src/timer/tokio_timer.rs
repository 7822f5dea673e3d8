use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{IntervalTimer, Stopwatch, TickCallback};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Interval timer driven by a tokio task.
///
/// Each `start` spawns one task on the given runtime; `reset` aborts it.
/// Late ticks are delivered in a burst so the schedule stays anchored to
/// the original start.
#[derive(Debug)]
pub struct TokioIntervalTimer {
    stopwatch: Stopwatch,
    period: Duration,
    handle: Handle,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TokioIntervalTimer {
    pub fn new(handle: Handle, period: Duration) -> Self {
        Self::with_clock(handle, period, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(handle: Handle, period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            stopwatch: Stopwatch::new(clock),
            period: period.max(MIN_PERIOD),
            handle,
            task: Mutex::new(None),
        }
    }

    /// Bind to the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Runtime`](crate::CoreError::Runtime) outside a
    /// tokio runtime.
    pub fn try_current(period: Duration) -> Result<Self> {
        Ok(Self::new(Handle::try_current()?, period))
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IntervalTimer for TokioIntervalTimer {
    fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn start(&self, mut callback: TickCallback) {
        let mut task = self.task();
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let period = self.period;
        *task = Some(self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticker.tick().await;
                callback();
            }
        }));
        tracing::trace!(period_ms = period.as_millis() as u64, "interval timer armed");
    }

    fn reset(&self) {
        if let Some(task) = self.task().take() {
            task.abort();
            tracing::trace!("interval timer disarmed");
        }
    }

    fn is_armed(&self) -> bool {
        self.task().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for TokioIntervalTimer {
    fn drop(&mut self) {
        self.reset();
    }
}

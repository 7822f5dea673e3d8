//! Explicit state machine over an [`IntervalTimer`].
//!
//! ```text
//! Idle -> Running -> Paused -> Running -> ... -> Idle
//! ```
//!
//! Commands that do not apply to the current state return `None` and leave
//! the timestamps alone.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::IntervalTimer;
use crate::events::Event;

/// Hook run on every tick while the controller is running.
pub type TickHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

impl TimerState {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
        }
    }
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TimerController {
    timer: Arc<dyn IntervalTimer>,
    on_tick: TickHook,
    state: TimerState,
}

impl TimerController {
    pub fn new(timer: Arc<dyn IntervalTimer>, on_tick: TickHook) -> Self {
        Self {
            timer,
            on_tick,
            state: TimerState::Idle,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn timer(&self) -> &Arc<dyn IntervalTimer> {
        &self.timer
    }

    /// Running: live elapsed. Paused: elapsed at pause entry. Idle: zero.
    pub fn elapsed_ms(&self) -> u64 {
        match self.state {
            TimerState::Idle => 0,
            TimerState::Running => self.timer.elapsed_ms(),
            TimerState::Paused => self.timer.paused_ms(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.state != TimerState::Idle {
            return self.reject("start");
        }
        self.timer.reset_start_time();
        self.arm();
        self.state = TimerState::Running;
        Some(Event::TimerStarted {
            period_ms: self.timer.period().as_millis() as u64,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return self.reject("pause");
        }
        self.timer.reset_pause_time();
        self.timer.reset();
        self.state = TimerState::Paused;
        Some(Event::TimerPaused {
            elapsed_ms: self.timer.paused_ms(),
            at: Utc::now(),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if self.state != TimerState::Paused {
            return self.reject("resume");
        }
        self.timer.update_paused_time();
        self.arm();
        self.state = TimerState::Running;
        Some(Event::TimerResumed {
            elapsed_ms: self.timer.elapsed_ms(),
            at: Utc::now(),
        })
    }

    pub fn stop(&mut self) -> Option<Event> {
        self.timer.reset();
        if self.state == TimerState::Idle {
            return None;
        }
        let elapsed_ms = self.elapsed_ms();
        self.state = TimerState::Idle;
        Some(Event::TimerStopped {
            elapsed_ms,
            at: Utc::now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm(&self) {
        let hook = Arc::clone(&self.on_tick);
        self.timer.start(Box::new(move || hook()));
    }

    fn reject(&self, command: &str) -> Option<Event> {
        tracing::debug!(command, state = %self.state, "ignoring timer command");
        None
    }
}

impl std::fmt::Debug for TimerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerController")
            .field("state", &self.state)
            .field("elapsed_ms", &self.elapsed_ms())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{ManualIntervalTimer, DEFAULT_PERIOD};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn controller() -> (Arc<ManualIntervalTimer>, Arc<AtomicUsize>, TimerController) {
        let timer = Arc::new(ManualIntervalTimer::new(DEFAULT_PERIOD));
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&ticks);
        let ctl = TimerController::new(
            timer.clone(),
            Arc::new(move || {
                t.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (timer, ticks, ctl)
    }

    #[test]
    fn start_pause_resume_stop() {
        let (_timer, _ticks, mut ctl) = controller();
        assert_eq!(ctl.state(), TimerState::Idle);

        assert!(ctl.start().is_some());
        assert_eq!(ctl.state(), TimerState::Running);

        assert!(ctl.pause().is_some());
        assert_eq!(ctl.state(), TimerState::Paused);

        assert!(ctl.resume().is_some());
        assert_eq!(ctl.state(), TimerState::Running);

        assert!(ctl.stop().is_some());
        assert_eq!(ctl.state(), TimerState::Idle);
    }

    #[test]
    fn out_of_order_commands_are_ignored() {
        let (timer, _ticks, mut ctl) = controller();
        assert!(ctl.resume().is_none());
        assert!(ctl.pause().is_none());
        assert!(ctl.stop().is_none());

        ctl.start();
        assert!(ctl.start().is_none());
        timer.advance(Duration::from_millis(400));
        ctl.pause();
        assert!(ctl.pause().is_none());

        // A second resume mark would have shifted start_time again.
        timer.advance(Duration::from_millis(100));
        ctl.resume();
        assert!(ctl.resume().is_none());
        assert_eq!(ctl.elapsed_ms(), 400);
    }

    #[test]
    fn paused_controller_stops_ticking_and_freezes_elapsed() {
        let (timer, ticks, mut ctl) = controller();
        ctl.start();
        timer.advance(Duration::from_millis(250));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        ctl.pause();
        timer.advance(Duration::from_secs(10));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(ctl.elapsed_ms(), 250);

        ctl.resume();
        timer.advance(Duration::from_millis(50));
        assert_eq!(ctl.elapsed_ms(), 300);
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn pause_event_reports_elapsed_at_entry() {
        let (timer, _ticks, mut ctl) = controller();
        ctl.start();
        timer.advance(Duration::from_millis(1_234));
        match ctl.pause() {
            Some(Event::TimerPaused { elapsed_ms, .. }) => assert_eq!(elapsed_ms, 1_234),
            other => panic!("Expected TimerPaused, got {other:?}"),
        }
    }
}

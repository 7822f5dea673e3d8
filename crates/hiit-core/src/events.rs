use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerState;
use crate::workout::{Phase, ProgressBar};

/// Every state change in a workout produces an Event.
/// Front ends print them or subscribe to them through the view model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        period_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        /// Elapsed time when the pause began.
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        phase: Phase,
        set: u32,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    WorkoutFinished {
        elapsed_ms: u64,
        sets: u32,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: Phase,
        set: u32,
        sets: u32,
        elapsed_ms: u64,
        phase_remaining_ms: u64,
        total_remaining_ms: u64,
        progress: ProgressBar,
        at: DateTime<Utc>,
    },
}

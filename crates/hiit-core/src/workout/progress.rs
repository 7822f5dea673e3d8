use serde::{Deserialize, Serialize};

use super::WorkoutSettings;

/// Resolution of [`ProgressBar`]: a full phase is `max == 1000`.
pub const PROGRESS_SCALE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Work,
    Rest,
    Finished,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::Rest => "rest",
            Phase::Finished => "finished",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer progress pair for a progress-bar binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBar {
    pub progress: u32,
    pub max: u32,
}

impl ProgressBar {
    pub const EMPTY: ProgressBar = ProgressBar {
        progress: 0,
        max: PROGRESS_SCALE,
    };
    pub const FULL: ProgressBar = ProgressBar {
        progress: PROGRESS_SCALE,
        max: PROGRESS_SCALE,
    };

    /// `done` out of `total`, scaled to [`PROGRESS_SCALE`]. An empty span
    /// counts as complete.
    pub fn scaled(done: u64, total: u64) -> Self {
        if total == 0 {
            return Self::FULL;
        }
        let progress = (done.min(total) * PROGRESS_SCALE as u64 / total) as u32;
        Self {
            progress,
            max: PROGRESS_SCALE,
        }
    }

    pub fn fraction(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        self.progress as f64 / self.max as f64
    }
}

/// Where a workout stands at a given elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutProgress {
    pub phase: Phase,
    /// 1-based. Stays at the last set once finished.
    pub set: u32,
    pub phase_elapsed_ms: u64,
    pub phase_remaining_ms: u64,
    pub total_remaining_ms: u64,
    pub progress: ProgressBar,
}

impl WorkoutProgress {
    pub fn at(settings: &WorkoutSettings, elapsed_ms: u64) -> Self {
        let total = settings.total_ms();
        let cycle = settings.cycle_ms();
        if elapsed_ms >= total || cycle == 0 {
            return Self::finished(settings);
        }

        let index = elapsed_ms / cycle;
        let within = elapsed_ms % cycle;
        let (phase, phase_elapsed, phase_total) = if within < settings.work_ms() {
            (Phase::Work, within, settings.work_ms())
        } else {
            (Phase::Rest, within - settings.work_ms(), settings.rest_ms())
        };

        Self {
            phase,
            set: index as u32 + 1,
            phase_elapsed_ms: phase_elapsed,
            phase_remaining_ms: phase_total - phase_elapsed,
            total_remaining_ms: total - elapsed_ms,
            progress: ProgressBar::scaled(phase_elapsed, phase_total),
        }
    }

    /// State shown before the first tick.
    pub fn initial(settings: &WorkoutSettings) -> Self {
        Self::at(settings, 0)
    }

    fn finished(settings: &WorkoutSettings) -> Self {
        Self {
            phase: Phase::Finished,
            set: settings.sets,
            phase_elapsed_ms: 0,
            phase_remaining_ms: 0,
            total_remaining_ms: 0,
            progress: ProgressBar::FULL,
        }
    }
}

/// One contiguous work or rest span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub phase: Phase,
    pub set: u32,
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// The full sequence of segments a workout runs through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub settings: WorkoutSettings,
    pub total_ms: u64,
    pub segments: Vec<Segment>,
}

impl WorkoutPlan {
    pub fn new(settings: WorkoutSettings) -> Self {
        let mut segments = Vec::with_capacity(settings.sets as usize * 2);
        let mut at = 0;
        for set in 1..=settings.sets {
            segments.push(Segment {
                phase: Phase::Work,
                set,
                start_ms: at,
                duration_ms: settings.work_ms(),
            });
            at += settings.work_ms();
            if set < settings.sets && settings.rest_ms() > 0 {
                segments.push(Segment {
                    phase: Phase::Rest,
                    set,
                    start_ms: at,
                    duration_ms: settings.rest_ms(),
                });
                at += settings.rest_ms();
            }
        }
        Self {
            settings,
            total_ms: at,
            segments,
        }
    }
}

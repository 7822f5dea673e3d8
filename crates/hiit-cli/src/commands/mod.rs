pub mod config;
pub mod plan;
pub mod run;

use clap::Args;
use hiit_core::WorkoutSettings;

/// Per-invocation overrides of the configured workout.
#[derive(Args, Debug, Default)]
pub struct WorkoutOverrides {
    /// Work phase length in seconds
    #[arg(long)]
    pub work: Option<u32>,
    /// Rest phase length in seconds
    #[arg(long)]
    pub rest: Option<u32>,
    /// Number of sets
    #[arg(long)]
    pub sets: Option<u32>,
}

impl WorkoutOverrides {
    pub fn apply(&self, base: WorkoutSettings) -> Result<WorkoutSettings, hiit_core::ValidationError> {
        WorkoutSettings::new(
            self.work.unwrap_or(base.work_secs),
            self.rest.unwrap_or(base.rest_secs),
            self.sets.unwrap_or(base.sets),
        )
    }
}

/// `mm:ss`, rounding partial seconds up so a countdown never shows 00:00
/// before it is over.
pub fn format_clock(ms: u64) -> String {
    let secs = ms.div_ceil(1000);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

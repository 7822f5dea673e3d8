//! Work/rest workout model built on the interval timer.

mod progress;
mod settings;
mod view_model;

pub use progress::{Phase, ProgressBar, Segment, WorkoutPlan, WorkoutProgress, PROGRESS_SCALE};
pub use settings::{WorkoutSettings, MAX_PHASE_SECS, MAX_SETS};
pub use view_model::{PreferenceStore, WorkoutViewModel};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest single work or rest phase (24 hours).
pub const MAX_PHASE_SECS: u32 = 24 * 60 * 60;
pub const MAX_SETS: u32 = 999;

/// User-configured workout shape. Persisted as the `[workout]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSettings {
    #[serde(default = "default_work_secs")]
    pub work_secs: u32,
    /// Zero means sets run back to back.
    #[serde(default = "default_rest_secs")]
    pub rest_secs: u32,
    #[serde(default = "default_sets")]
    pub sets: u32,
}

fn default_work_secs() -> u32 {
    20
}
fn default_rest_secs() -> u32 {
    10
}
fn default_sets() -> u32 {
    8
}

impl Default for WorkoutSettings {
    fn default() -> Self {
        Self {
            work_secs: default_work_secs(),
            rest_secs: default_rest_secs(),
            sets: default_sets(),
        }
    }
}

impl WorkoutSettings {
    pub fn new(work_secs: u32, rest_secs: u32, sets: u32) -> Result<Self, ValidationError> {
        let settings = Self {
            work_secs,
            rest_secs,
            sets,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.work_secs == 0 {
            return Err(ValidationError::NotPositive {
                field: "work_secs".into(),
            });
        }
        if self.sets == 0 {
            return Err(ValidationError::NotPositive {
                field: "sets".into(),
            });
        }
        for (field, value, max) in [
            ("work_secs", self.work_secs, MAX_PHASE_SECS),
            ("rest_secs", self.rest_secs, MAX_PHASE_SECS),
            ("sets", self.sets, MAX_SETS),
        ] {
            if value > max {
                return Err(ValidationError::TooLarge {
                    field: field.into(),
                    value: value as u64,
                    max: max as u64,
                });
            }
        }
        Ok(())
    }

    pub fn work_ms(&self) -> u64 {
        self.work_secs as u64 * 1000
    }

    pub fn rest_ms(&self) -> u64 {
        self.rest_secs as u64 * 1000
    }

    /// Work plus rest: the span of every set except the last.
    pub fn cycle_ms(&self) -> u64 {
        self.work_ms() + self.rest_ms()
    }

    /// All sets, with no rest after the final one.
    pub fn total_ms(&self) -> u64 {
        if self.sets == 0 {
            return 0;
        }
        self.sets as u64 * self.work_ms() + (self.sets as u64 - 1) * self.rest_ms()
    }
}

//! # hiit-core
//!
//! Core library for the hiit-timer work/rest interval timer. The CLI in
//! `hiit-cli` is a thin front end over the same types.
//!
//! ## Architecture
//!
//! - **Interval timer**: elapsed/paused time accounting plus a fixed-rate
//!   periodic callback, behind the [`IntervalTimer`] trait with a tokio
//!   implementation and a hand-driven one for tests
//! - **Controller**: explicit Idle/Running/Paused state machine over a timer
//! - **Workout**: view model deriving phase, set and progress from elapsed
//!   time, exposed as [`Observable`] properties
//! - **Storage**: TOML configuration, also used as the preference store
//!
//! ## Key Components
//!
//! - [`TokioIntervalTimer`] / [`ManualIntervalTimer`]: timer implementations
//! - [`WorkoutViewModel`]: observable workout state
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod observable;
pub mod storage;
pub mod timer;
pub mod workout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, Result, ValidationError};
pub use events::Event;
pub use observable::{Observable, SubscriptionId};
pub use storage::{Config, ConfigStore};
pub use timer::{
    IntervalTimer, ManualIntervalTimer, TimerController, TimerState, TokioIntervalTimer,
    DEFAULT_PERIOD,
};
pub use workout::{
    Phase, PreferenceStore, ProgressBar, WorkoutPlan, WorkoutProgress, WorkoutSettings,
    WorkoutViewModel,
};

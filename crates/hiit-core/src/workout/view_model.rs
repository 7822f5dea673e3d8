//! Workout view model.
//!
//! Owns one [`TimerController`] and turns its elapsed time into observable
//! properties a view layer can bind to. Every timer tick calls
//! [`WorkoutViewModel::refresh`]; when the last set ends the timer is
//! stopped and the phase becomes [`Phase::Finished`].
//!
//! Property values are written while the controller lock is held, so they
//! always match the controller's latest transition. Listeners are called
//! afterwards from a queue, in the order the changes were made; a command
//! issued from inside a listener is delivered once that listener returns.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;

use super::{Phase, ProgressBar, WorkoutProgress, WorkoutSettings};
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::observable::{Observable, SubscriptionId};
use crate::timer::{IntervalTimer, TickHook, TimerController, TimerState};

/// Where workout settings are persisted between runs.
pub trait PreferenceStore: Send + Sync {
    /// Stored settings, or `None` if nothing usable is stored.
    fn load_settings(&self) -> Option<WorkoutSettings>;

    fn save_settings(&self, settings: &WorkoutSettings) -> Result<()>;
}

/// A property change waiting to be delivered to listeners.
enum Notice {
    State(TimerState),
    Elapsed(u64),
    Phase(Phase),
    Set(u32),
    Progress(ProgressBar),
    Settings(WorkoutSettings),
    Event(Event),
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<Notice>,
    delivering: bool,
}

pub struct WorkoutViewModel {
    controller: Mutex<TimerController>,
    outbox: Mutex<Outbox>,
    pub state: Observable<TimerState>,
    /// Capped at the workout's total duration.
    pub elapsed_ms: Observable<u64>,
    pub phase: Observable<Phase>,
    pub set: Observable<u32>,
    pub progress: Observable<ProgressBar>,
    pub settings: Observable<WorkoutSettings>,
    /// Most recent event; published on every event, even a repeated one.
    pub events: Observable<Option<Event>>,
}

impl WorkoutViewModel {
    /// # Errors
    ///
    /// Returns a validation error if `settings` describe an empty workout.
    pub fn new(timer: Arc<dyn IntervalTimer>, settings: WorkoutSettings) -> Result<Arc<Self>> {
        settings.validate()?;
        let initial = WorkoutProgress::initial(&settings);
        Ok(Arc::new_cyclic(|me: &Weak<Self>| {
            let me = me.clone();
            let on_tick: TickHook = Arc::new(move || {
                if let Some(vm) = me.upgrade() {
                    vm.refresh();
                }
            });
            Self {
                controller: Mutex::new(TimerController::new(timer, on_tick)),
                outbox: Mutex::new(Outbox::default()),
                state: Observable::new(TimerState::Idle),
                elapsed_ms: Observable::new(0),
                phase: Observable::new(initial.phase),
                set: Observable::new(initial.set),
                progress: Observable::new(initial.progress),
                settings: Observable::new(settings),
                events: Observable::new(None),
            }
        }))
    }

    /// Build with settings from `store`, falling back to defaults, and keep
    /// the store updated from then on.
    pub fn with_preferences(
        timer: Arc<dyn IntervalTimer>,
        store: Arc<dyn PreferenceStore>,
    ) -> Result<Arc<Self>> {
        let settings = store
            .load_settings()
            .filter(|s| s.validate().is_ok())
            .unwrap_or_default();
        let vm = Self::new(timer, settings)?;
        vm.bind_preferences(store);
        Ok(vm)
    }

    /// Write every settings change through to `store`.
    pub fn bind_preferences(&self, store: Arc<dyn PreferenceStore>) -> SubscriptionId {
        self.settings.subscribe(move |settings| {
            if let Err(e) = store.save_settings(settings) {
                tracing::warn!(error = %e, "failed to persist workout settings");
            }
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn timer_state(&self) -> TimerState {
        self.controller().state()
    }

    pub fn current(&self) -> WorkoutProgress {
        let elapsed = self.controller().elapsed_ms();
        WorkoutProgress::at(&self.settings.get(), elapsed)
    }

    /// Point-in-time summary of the workout as an [`Event::StateSnapshot`].
    ///
    /// When idle this describes what is on screen: the initial display
    /// after a stop, the finished one after the last set.
    pub fn snapshot(&self) -> Event {
        let settings = self.settings.get();
        let (state, elapsed_ms) = {
            let ctl = self.controller();
            let elapsed_ms = match ctl.state() {
                TimerState::Idle => self.elapsed_ms.get(),
                _ => ctl.elapsed_ms().min(settings.total_ms()),
            };
            (ctl.state(), elapsed_ms)
        };
        let progress = WorkoutProgress::at(&settings, elapsed_ms);
        Event::StateSnapshot {
            state,
            phase: progress.phase,
            set: progress.set,
            sets: settings.sets,
            elapsed_ms,
            phase_remaining_ms: progress.phase_remaining_ms,
            total_remaining_ms: progress.total_remaining_ms,
            progress: progress.progress,
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self) -> Option<Event> {
        let settings = self.settings.get();
        let (event, deliver) = {
            let mut ctl = self.controller();
            let event = ctl.start()?;
            let deliver = self.stage(|s| {
                s.progress(&WorkoutProgress::initial(&settings), 0);
                s.state(TimerState::Running);
                s.event(event.clone());
            });
            (event, deliver)
        };
        tracing::info!(?settings, "workout started");
        self.flush(deliver);
        Some(event)
    }

    pub fn pause(&self) -> Option<Event> {
        self.transition(TimerController::pause, TimerState::Paused)
    }

    pub fn resume(&self) -> Option<Event> {
        self.transition(TimerController::resume, TimerState::Running)
    }

    /// Start, pause or resume depending on the current state.
    pub fn toggle(&self) -> Option<Event> {
        match self.timer_state() {
            TimerState::Idle => self.start(),
            TimerState::Running => self.pause(),
            TimerState::Paused => self.resume(),
        }
    }

    /// Abandon the run and return to the initial display.
    pub fn stop(&self) -> Option<Event> {
        let settings = self.settings.get();
        let (event, deliver) = {
            let mut ctl = self.controller();
            let event = ctl.stop()?;
            let deliver = self.stage(|s| {
                s.state(TimerState::Idle);
                s.progress(&WorkoutProgress::initial(&settings), 0);
                s.event(event.clone());
            });
            (event, deliver)
        };
        tracing::info!("workout stopped");
        self.flush(deliver);
        Some(event)
    }

    /// # Errors
    ///
    /// Rejects invalid settings, and any change while a run is in progress.
    pub fn set_settings(&self, settings: WorkoutSettings) -> Result<()> {
        settings.validate()?;
        let deliver = {
            let ctl = self.controller();
            let state = ctl.state();
            if state != TimerState::Idle {
                return Err(ValidationError::Busy {
                    action: "change settings".into(),
                    state: state.to_string(),
                }
                .into());
            }
            self.stage(|s| {
                s.progress(&WorkoutProgress::initial(&settings), 0);
                s.settings(settings);
            })
        };
        self.flush(deliver);
        Ok(())
    }

    pub fn set_work_secs(&self, work_secs: u32) -> Result<()> {
        self.set_settings(WorkoutSettings {
            work_secs,
            ..self.settings.get()
        })
    }

    pub fn set_rest_secs(&self, rest_secs: u32) -> Result<()> {
        self.set_settings(WorkoutSettings {
            rest_secs,
            ..self.settings.get()
        })
    }

    pub fn set_sets(&self, sets: u32) -> Result<()> {
        self.set_settings(WorkoutSettings {
            sets,
            ..self.settings.get()
        })
    }

    /// Recompute every property from the timer. Called on each tick.
    pub fn refresh(&self) {
        let deliver = {
            let mut ctl = self.controller();
            if ctl.state() == TimerState::Idle {
                return;
            }
            let settings = self.settings.get();
            let elapsed = ctl.elapsed_ms();
            let progress = WorkoutProgress::at(&settings, elapsed);
            let finished = progress.phase == Phase::Finished && ctl.stop().is_some();

            self.stage(|s| {
                let moved = s.vm.phase.get() != progress.phase || s.vm.set.get() != progress.set;
                s.progress(&progress, elapsed.min(settings.total_ms()));
                if finished {
                    s.state(TimerState::Idle);
                    tracing::info!(
                        elapsed_ms = settings.total_ms(),
                        sets = settings.sets,
                        "workout finished"
                    );
                    s.event(Event::WorkoutFinished {
                        elapsed_ms: settings.total_ms(),
                        sets: settings.sets,
                        at: Utc::now(),
                    });
                } else if moved {
                    tracing::debug!(phase = %progress.phase, set = progress.set, "phase changed");
                    let duration_ms = match progress.phase {
                        Phase::Rest => settings.rest_ms(),
                        _ => settings.work_ms(),
                    };
                    s.event(Event::PhaseChanged {
                        phase: progress.phase,
                        set: progress.set,
                        duration_secs: duration_ms / 1000,
                        at: Utc::now(),
                    });
                }
            })
        };
        self.flush(deliver);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn transition(
        &self,
        apply: fn(&mut TimerController) -> Option<Event>,
        state: TimerState,
    ) -> Option<Event> {
        let (event, deliver) = {
            let mut ctl = self.controller();
            let event = apply(&mut *ctl)?;
            let deliver = self.stage(|s| {
                s.state(state);
                s.event(event.clone());
            });
            (event, deliver)
        };
        self.flush(deliver);
        Some(event)
    }

    /// Write property values and queue their notifications. Returns `true`
    /// when the caller must deliver the queue once its locks are released.
    fn stage(&self, f: impl FnOnce(&mut Staged<'_>)) -> bool {
        let mut outbox = self.outbox();
        let Outbox { queue, delivering } = &mut *outbox;
        f(&mut Staged {
            vm: self,
            queue: &mut *queue,
        });
        if *delivering || queue.is_empty() {
            return false;
        }
        *delivering = true;
        true
    }

    fn flush(&self, deliver: bool) {
        if !deliver {
            return;
        }
        let _guard = Delivering(self);
        loop {
            let notice = {
                let mut outbox = self.outbox();
                match outbox.queue.pop_front() {
                    Some(notice) => notice,
                    None => {
                        outbox.delivering = false;
                        return;
                    }
                }
            };
            match notice {
                Notice::State(v) => self.state.notify(&v),
                Notice::Elapsed(v) => self.elapsed_ms.notify(&v),
                Notice::Phase(v) => self.phase.notify(&v),
                Notice::Set(v) => self.set.notify(&v),
                Notice::Progress(v) => self.progress.notify(&v),
                Notice::Settings(v) => self.settings.notify(&v),
                Notice::Event(e) => self.events.notify(&Some(e)),
            }
        }
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn controller(&self) -> MutexGuard<'_, TimerController> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Property writes for one command, collected under the outbox lock.
struct Staged<'a> {
    vm: &'a WorkoutViewModel,
    queue: &'a mut VecDeque<Notice>,
}

impl Staged<'_> {
    fn state(&mut self, state: TimerState) {
        if self.vm.state.replace(state) {
            self.queue.push_back(Notice::State(state));
        }
    }

    /// `set` goes first so phase listeners read a consistent set number.
    fn progress(&mut self, progress: &WorkoutProgress, elapsed_ms: u64) {
        if self.vm.set.replace(progress.set) {
            self.queue.push_back(Notice::Set(progress.set));
        }
        if self.vm.phase.replace(progress.phase) {
            self.queue.push_back(Notice::Phase(progress.phase));
        }
        if self.vm.progress.replace(progress.progress) {
            self.queue.push_back(Notice::Progress(progress.progress));
        }
        if self.vm.elapsed_ms.replace(elapsed_ms) {
            self.queue.push_back(Notice::Elapsed(elapsed_ms));
        }
    }

    fn settings(&mut self, settings: WorkoutSettings) {
        if self.vm.settings.replace(settings) {
            self.queue.push_back(Notice::Settings(settings));
        }
    }

    fn event(&mut self, event: Event) {
        self.vm.events.replace(Some(event.clone()));
        self.queue.push_back(Notice::Event(event));
    }
}

/// Hands delivery back if a listener panics, so later changes still go out.
struct Delivering<'a>(&'a WorkoutViewModel);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.outbox().delivering = false;
        }
    }
}

impl std::fmt::Debug for WorkoutViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkoutViewModel")
            .field("state", &self.state.get())
            .field("phase", &self.phase.get())
            .field("set", &self.set.get())
            .field("elapsed_ms", &self.elapsed_ms.get())
            .field("settings", &self.settings.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{ManualIntervalTimer, DEFAULT_PERIOD};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn setup(settings: WorkoutSettings) -> (Arc<ManualIntervalTimer>, Arc<WorkoutViewModel>) {
        let timer = Arc::new(ManualIntervalTimer::new(DEFAULT_PERIOD));
        let vm = WorkoutViewModel::new(timer.clone(), settings).unwrap();
        (timer, vm)
    }

    #[test]
    fn ticks_drive_phase_and_set() {
        let (timer, vm) = setup(WorkoutSettings::default());
        vm.start();
        timer.advance(Duration::from_millis(25_000));

        assert_eq!(vm.phase.get(), Phase::Rest);
        assert_eq!(vm.set.get(), 1);
        assert_eq!(vm.elapsed_ms.get(), 25_000);
        assert_eq!(vm.progress.get().progress, 500);
    }

    #[test]
    fn pause_freezes_properties() {
        let (timer, vm) = setup(WorkoutSettings::default());
        vm.start();
        timer.advance(Duration::from_millis(5_000));
        vm.pause();
        timer.advance(Duration::from_secs(60));

        assert_eq!(vm.state.get(), TimerState::Paused);
        assert_eq!(vm.elapsed_ms.get(), 5_000);

        vm.resume();
        timer.advance(Duration::from_millis(15_000));
        assert_eq!(vm.elapsed_ms.get(), 20_000);
        assert_eq!(vm.phase.get(), Phase::Rest);
    }

    #[test]
    fn finishing_stops_the_timer() {
        let (timer, vm) = setup(WorkoutSettings::new(1, 1, 2).unwrap());
        let finished = Arc::new(Mutex::new(0));
        let f = Arc::clone(&finished);
        vm.events.subscribe(move |e| {
            if matches!(e, Some(Event::WorkoutFinished { .. })) {
                *f.lock().unwrap() += 1;
            }
        });

        vm.start();
        timer.advance(Duration::from_secs(10));

        assert_eq!(*finished.lock().unwrap(), 1);
        assert_eq!(vm.phase.get(), Phase::Finished);
        assert_eq!(vm.state.get(), TimerState::Idle);
        assert_eq!(vm.elapsed_ms.get(), 3_000);
        assert!(!timer.is_armed());
    }

    #[test]
    fn toggle_cycles_states() {
        let (_timer, vm) = setup(WorkoutSettings::default());
        vm.toggle();
        assert_eq!(vm.timer_state(), TimerState::Running);
        vm.toggle();
        assert_eq!(vm.timer_state(), TimerState::Paused);
        vm.toggle();
        assert_eq!(vm.timer_state(), TimerState::Running);
        vm.stop();
        assert_eq!(vm.timer_state(), TimerState::Idle);
    }

    #[test]
    fn settings_locked_while_running() {
        let (_timer, vm) = setup(WorkoutSettings::default());
        vm.start();
        assert!(vm.set_sets(3).is_err());
        vm.stop();
        vm.set_sets(3).unwrap();
        assert_eq!(vm.settings.get().sets, 3);
        assert!(vm.set_work_secs(0).is_err());
    }

    #[test]
    fn stop_restores_initial_display() {
        let (timer, vm) = setup(WorkoutSettings::default());
        vm.start();
        timer.advance(Duration::from_secs(45));
        assert_eq!(vm.set.get(), 2);
        vm.stop();
        assert_eq!(vm.set.get(), 1);
        assert_eq!(vm.phase.get(), Phase::Work);
        assert_eq!(vm.elapsed_ms.get(), 0);
    }

    fn snapshot_of(vm: &WorkoutViewModel) -> (TimerState, Phase, u32, u64, u64, u64) {
        match vm.snapshot() {
            Event::StateSnapshot {
                state,
                phase,
                set,
                elapsed_ms,
                phase_remaining_ms,
                total_remaining_ms,
                ..
            } => (
                state,
                phase,
                set,
                elapsed_ms,
                phase_remaining_ms,
                total_remaining_ms,
            ),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn snapshot_while_running_and_paused() {
        let (timer, vm) = setup(WorkoutSettings::default());
        vm.start();
        timer.advance(Duration::from_millis(25_000));
        assert_eq!(
            snapshot_of(&vm),
            (TimerState::Running, Phase::Rest, 1, 25_000, 5_000, 205_000)
        );

        vm.pause();
        timer.advance(Duration::from_secs(60));
        assert_eq!(
            snapshot_of(&vm),
            (TimerState::Paused, Phase::Rest, 1, 25_000, 5_000, 205_000)
        );
    }

    #[test]
    fn snapshot_when_idle_describes_the_display() {
        let (timer, vm) = setup(WorkoutSettings::new(1, 1, 2).unwrap());
        assert_eq!(
            snapshot_of(&vm),
            (TimerState::Idle, Phase::Work, 1, 0, 1_000, 3_000)
        );

        vm.start();
        timer.advance(Duration::from_millis(1_500));
        vm.stop();
        assert_eq!(
            snapshot_of(&vm),
            (TimerState::Idle, Phase::Work, 1, 0, 1_000, 3_000)
        );

        vm.start();
        timer.advance(Duration::from_secs(10));
        assert_eq!(
            snapshot_of(&vm),
            (TimerState::Idle, Phase::Finished, 2, 3_000, 0, 0)
        );
        match vm.snapshot() {
            Event::StateSnapshot { sets, progress, .. } => {
                assert_eq!(sets, 2);
                assert_eq!(progress, ProgressBar::FULL);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn phase_listener_may_stop_the_workout() {
        let (timer, vm) = setup(WorkoutSettings::default());
        let weak = Arc::downgrade(&vm);
        vm.phase.subscribe(move |phase| {
            if *phase == Phase::Rest {
                if let Some(vm) = weak.upgrade() {
                    vm.stop();
                }
            }
        });
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&events);
        vm.events.subscribe(move |event| {
            if let Some(event) = event {
                e.lock().unwrap().push(event.clone());
            }
        });

        vm.start();
        let (done_tx, done_rx) = mpsc::channel();
        let worker = {
            let timer = Arc::clone(&timer);
            std::thread::spawn(move || {
                timer.advance(Duration::from_secs(25));
                done_tx.send(()).unwrap();
            })
        };
        done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("ticking hung when a listener stopped the workout");
        worker.join().unwrap();

        assert_eq!(vm.state.get(), TimerState::Idle);
        assert_eq!((vm.phase.get(), vm.set.get()), (Phase::Work, 1));
        assert_eq!(vm.elapsed_ms.get(), 0);
        assert!(!timer.is_armed());
        let events = events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(Event::TimerStopped { elapsed_ms: 20_000, .. })
        ));
        assert!(matches!(
            events[events.len() - 2],
            Event::PhaseChanged {
                phase: Phase::Rest,
                set: 1,
                ..
            }
        ));
    }

    #[test]
    fn stop_is_not_overwritten_by_a_concurrent_tick() {
        let (timer, vm) = setup(WorkoutSettings::new(1, 1, 500).unwrap());
        let running = Arc::new(AtomicBool::new(true));
        let ticker = {
            let (timer, running) = (Arc::clone(&timer), Arc::clone(&running));
            std::thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    timer.advance(Duration::from_millis(700));
                }
            })
        };

        for _ in 0..200 {
            vm.start();
            std::thread::yield_now();
            if vm.stop().is_some() {
                assert_eq!(vm.state.get(), TimerState::Idle);
                assert_eq!((vm.phase.get(), vm.set.get()), (Phase::Work, 1));
                assert_eq!(vm.elapsed_ms.get(), 0);
                assert_eq!(vm.progress.get(), ProgressBar::EMPTY);
            }
        }
        running.store(false, Ordering::SeqCst);
        ticker.join().unwrap();
    }

    #[test]
    fn events_keep_command_order() {
        let (timer, vm) = setup(WorkoutSettings::default());
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let k = Arc::clone(&kinds);
        vm.events.subscribe(move |event| {
            let kind = match event {
                Some(Event::TimerStarted { .. }) => "started",
                Some(Event::TimerPaused { .. }) => "paused",
                Some(Event::TimerResumed { .. }) => "resumed",
                Some(Event::PhaseChanged { .. }) => "phase",
                Some(Event::TimerStopped { .. }) => "stopped",
                _ => "other",
            };
            k.lock().unwrap().push(kind);
        });

        vm.start();
        timer.advance(Duration::from_secs(21));
        vm.pause();
        vm.resume();
        vm.stop();
        assert_eq!(
            *kinds.lock().unwrap(),
            vec!["started", "phase", "paused", "resumed", "stopped"]
        );
    }
}

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use hiit_core::{
    Config, ConfigStore, Event, Phase, TimerState, TokioIntervalTimer, WorkoutSettings,
    WorkoutViewModel,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

use super::{format_clock, WorkoutOverrides};

const HELP: &str = "commands: p = pause, r = resume, <enter> = toggle, s = status, q = quit";

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub workout: WorkoutOverrides,
    /// Store the overrides as the new defaults
    #[arg(long)]
    pub save: bool,
    /// Print events as JSON lines instead of a countdown
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let settings = args.workout.apply(config.workout)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run_workout(settings, config.period(), args.save, args.json));
    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_background();
    result
}

async fn run_workout(
    settings: WorkoutSettings,
    period: Duration,
    save: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let timer = Arc::new(TokioIntervalTimer::try_current(period)?);
    let vm = if save {
        let vm = WorkoutViewModel::with_preferences(timer, Arc::new(ConfigStore::open()?))?;
        vm.set_settings(settings)?;
        vm
    } else {
        WorkoutViewModel::new(timer, settings)?
    };

    let done = Arc::new(Notify::new());
    bind_output(&vm, &done, json);

    if !json {
        eprintln!("{HELP}");
    }
    vm.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = done.notified() => break,
            _ = tokio::signal::ctrl_c() => {
                vm.stop();
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "p" => { vm.pause(); }
                    "r" => { vm.resume(); }
                    "" => { vm.toggle(); }
                    "s" => print_event(&vm.snapshot(), json),
                    "q" => {
                        vm.stop();
                        break;
                    }
                    other => eprintln!("unknown command '{other}'; {HELP}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
        }
    }

    if !json {
        println!();
    }
    Ok(())
}

/// Subscribe the terminal to the view model's properties.
fn bind_output(vm: &Arc<WorkoutViewModel>, done: &Arc<Notify>, json: bool) {
    let done = Arc::clone(done);
    vm.events.subscribe(move |event| {
        let Some(event) = event else { return };
        print_event(event, json);
        if matches!(event, Event::WorkoutFinished { .. }) {
            done.notify_one();
        }
    });

    if json {
        return;
    }

    // Countdown line, redrawn once per displayed second.
    let shown = Arc::new(AtomicU64::new(u64::MAX));
    let weak = Arc::downgrade(vm);
    vm.elapsed_ms.subscribe(move |_| {
        let Some(vm) = weak.upgrade() else { return };
        if vm.state.get() != TimerState::Running {
            return;
        }
        let now = vm.current();
        let secs = now.phase_remaining_ms.div_ceil(1000);
        if shown.swap(secs, Ordering::Relaxed) == secs {
            return;
        }
        let line = format!(
            "{:<5} set {}/{}  {}  (total {})   ",
            now.phase.as_str(),
            now.set,
            vm.settings.get().sets,
            format_clock(now.phase_remaining_ms),
            format_clock(now.total_remaining_ms)
        );
        redraw(&mut std::io::stdout().lock(), &line);
    });
}

fn print_event(event: &Event, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(error = %e, "cannot encode event"),
        }
    } else {
        println!("\r{:<40}", describe(event));
    }
}

/// Overwrite the current terminal line.
fn redraw(out: &mut impl Write, line: &str) {
    // The next redraw repaints the whole line, so a failed one is only traced.
    if let Err(e) = write!(out, "\r{line}").and_then(|()| out.flush()) {
        tracing::trace!(error = %e, "cannot redraw countdown");
    }
}

fn describe(event: &Event) -> String {
    match event {
        Event::TimerStarted { .. } => "started".to_string(),
        Event::TimerPaused { elapsed_ms, .. } => format!("paused at {}", format_clock(*elapsed_ms)),
        Event::TimerResumed { .. } => "resumed".to_string(),
        Event::TimerStopped { elapsed_ms, .. } => {
            format!("stopped after {}", format_clock(*elapsed_ms))
        }
        Event::PhaseChanged {
            phase: Phase::Rest,
            set,
            duration_secs,
            ..
        } => format!("rest after set {set} ({duration_secs}s)"),
        Event::PhaseChanged {
            set, duration_secs, ..
        } => format!("set {set}: work ({duration_secs}s)"),
        Event::WorkoutFinished {
            elapsed_ms, sets, ..
        } => format!("done: {sets} sets in {}", format_clock(*elapsed_ms)),
        Event::StateSnapshot {
            state,
            phase,
            set,
            sets,
            phase_remaining_ms,
            total_remaining_ms,
            ..
        } => format!(
            "{state}: {phase} set {set}/{sets}, {} left in phase, {} in total",
            format_clock(*phase_remaining_ms),
            format_clock(*total_remaining_ms)
        ),
    }
}

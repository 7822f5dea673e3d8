use clap::Args;
use hiit_core::{Config, Phase, WorkoutPlan};

use super::{format_clock, WorkoutOverrides};

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub workout: WorkoutOverrides,
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let plan = WorkoutPlan::new(args.workout.apply(config.workout)?);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!(
        "{} sets of {}s work / {}s rest, total {}",
        plan.settings.sets,
        plan.settings.work_secs,
        plan.settings.rest_secs,
        format_clock(plan.total_ms)
    );
    for segment in &plan.segments {
        let label = match segment.phase {
            Phase::Work => "work",
            Phase::Rest => "rest",
            Phase::Finished => continue,
        };
        println!(
            "  {}  set {:>3}  {}  {}s",
            format_clock(segment.start_ms),
            segment.set,
            label,
            segment.duration_ms / 1000
        );
    }
    Ok(())
}

// progress.rs — status, complete, reset.

use dte_progress::{derive, DerivedState, Step, StepState};

use super::Context;

pub fn status(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let state = derive(&ctx.store.read());

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_state(&state);
    }

    Ok(())
}

pub fn complete(ctx: &Context, step: Step) -> anyhow::Result<()> {
    ensure_unlocked(&derive(&ctx.store.read()), step)?;

    let record = ctx.store.complete(step);
    println!("{} completed.", step.title());
    println!();
    print_state(&derive(&record));
    Ok(())
}

pub fn reset(ctx: &Context) -> anyhow::Result<()> {
    ctx.store.reset();
    println!("Progress reset.");
    Ok(())
}

/// Refuse to complete a step the derived state still shows as locked.
/// Completing an available step, or re-completing a completed one, is fine.
pub fn ensure_unlocked(state: &DerivedState, step: Step) -> anyhow::Result<()> {
    if state.state_of(step) != StepState::Locked {
        return Ok(());
    }
    let prerequisite = match step {
        Step::Execute => Step::Train,
        _ => Step::Discover,
    };
    anyhow::bail!(
        "{} is locked: complete {} first",
        step.title(),
        prerequisite.title()
    )
}

/// Print the three steps as a small table.
pub fn print_state(state: &DerivedState) {
    println!("{:<10} {:<10} {}", "STEP", "STATE", "START");
    println!("{}", "-".repeat(28));
    for step in Step::ALL {
        println!(
            "{:<10} {:<10} {}",
            step.title(),
            state.state_of(step).to_string(),
            if state.can_start(step) { "yes" } else { "no" },
        );
    }
    if state.all_completed() {
        println!("\nAll steps completed.");
    }
}

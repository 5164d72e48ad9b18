//! Derivation of per-step view states from a [`PlanProgress`] record.
//!
//! `derive` is the only place that enforces the ordering between steps:
//! Train is fully re-derived from Discover, while Execute follows the
//! explicit marker that completing Train writes into the record. Whatever the
//! record holds, the result never shows Discover as locked.

use serde::{Deserialize, Serialize};

use crate::record::PlanProgress;
use crate::step::{Step, StepState};

/// The three states a view renders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivedState {
    pub discover: StepState,
    pub train: StepState,
    pub execute: StepState,
}

impl Default for DerivedState {
    /// The most-locked valid state: what a view shows with no saved progress.
    fn default() -> Self {
        derive(&PlanProgress::default())
    }
}

impl DerivedState {
    pub fn state_of(&self, step: Step) -> StepState {
        match step {
            Step::Discover => self.discover,
            Step::Train => self.train,
            Step::Execute => self.execute,
        }
    }

    /// Terminal state: nothing left to unlock or announce.
    pub fn all_completed(&self) -> bool {
        Step::ALL.iter().all(|s| self.state_of(*s).is_completed())
    }

    /// Whether a view may enter `step`. Discover is the entry point and can
    /// always be (re)started.
    pub fn can_start(&self, step: Step) -> bool {
        match step {
            Step::Discover => true,
            _ => self.state_of(step) == StepState::Available,
        }
    }
}

/// Map a durable record onto the states a view shows.
pub fn derive(record: &PlanProgress) -> DerivedState {
    let discover_done = record.discover == Some(StepState::Completed);

    let discover = if discover_done {
        StepState::Completed
    } else {
        StepState::Available
    };

    let train = if !discover_done {
        StepState::Locked
    } else if record.train == Some(StepState::Completed) {
        StepState::Completed
    } else {
        StepState::Available
    };

    let execute = match record.execute {
        Some(StepState::Completed) => StepState::Completed,
        Some(StepState::Available) => StepState::Available,
        _ => StepState::Locked,
    };

    DerivedState {
        discover,
        train,
        execute,
    }
}

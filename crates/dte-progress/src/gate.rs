// gate.rs — Notification gate for one-time "unlock" announcements.
//
// The gate is a pure function of (previous, current, seen flags). It reports
// at most one notification per evaluation and returns the updated flags; the
// caller persists them. Flags only go from unset to set. Two contexts racing
// on the same flag may both announce, which is tolerated.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::derivation::DerivedState;
use crate::step::{Step, StepState};

/// A milestone that gets a one-time "unlocked" notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Milestone {
    /// Train became available after Discover was completed.
    Train,
    /// Execute became available after Train was completed.
    Execute,
}

impl Milestone {
    /// The step this milestone unlocks.
    pub fn step(&self) -> Step {
        match self {
            Milestone::Train => Step::Train,
            Milestone::Execute => Step::Execute,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::Train => write!(f, "train"),
            Milestone::Execute => write!(f, "execute"),
        }
    }
}

/// Which milestone notifications have already been shown.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenFlags {
    pub train_unlocked: bool,
    pub execute_unlocked: bool,
}

impl SeenFlags {
    pub fn is_seen(&self, milestone: Milestone) -> bool {
        match milestone {
            Milestone::Train => self.train_unlocked,
            Milestone::Execute => self.execute_unlocked,
        }
    }

    /// Return a copy with `milestone` marked as seen.
    pub fn marked(mut self, milestone: Milestone) -> Self {
        match milestone {
            Milestone::Train => self.train_unlocked = true,
            Milestone::Execute => self.execute_unlocked = true,
        }
        self
    }
}

/// Result of one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    pub notification: Option<Milestone>,
    pub seen: SeenFlags,
}

/// Decide whether the move from `previous` to `current` announces a milestone.
///
/// `previous` is `None` for the first evaluation in a context; that counts as
/// "nothing was completed before", so a fresh view on an already-unlocked
/// record still announces a milestone whose flag is unset.
pub fn evaluate(
    previous: Option<&DerivedState>,
    current: &DerivedState,
    seen: SeenFlags,
) -> GateOutcome {
    if current.all_completed() {
        return GateOutcome {
            notification: None,
            seen,
        };
    }

    let was_completed = |step: Step| previous.is_some_and(|p| p.state_of(step).is_completed());

    let mut outcome = GateOutcome {
        notification: None,
        seen,
    };

    if !was_completed(Step::Discover)
        && current.discover.is_completed()
        && current.train == StepState::Available
        && !seen.is_seen(Milestone::Train)
    {
        outcome.notification = Some(Milestone::Train);
        outcome.seen = outcome.seen.marked(Milestone::Train);
    }

    // Exclusive with the Train check above: that one needs Train available.
    if !was_completed(Step::Train)
        && current.train.is_completed()
        && current.execute == StepState::Available
        && !seen.is_seen(Milestone::Execute)
    {
        outcome.notification = Some(Milestone::Execute);
        outcome.seen = outcome.seen.marked(Milestone::Execute);
    }

    outcome
}

/// Session-scoped gate for a view entered straight from the Discover flow.
///
/// Independent of the durable flags: it announces Train once per session
/// even if another context already tripped the durable gate. Returns the
/// notification (if any) and the new session flag.
pub fn discover_entry(current: &DerivedState, session_seen: bool) -> (Option<Milestone>, bool) {
    if !session_seen && current.discover.is_completed() && current.train == StepState::Available
    {
        (Some(Milestone::Train), true)
    } else {
        (None, session_seen)
    }
}

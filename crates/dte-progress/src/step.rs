// step.rs — Steps of the guided flow and their per-step state.
//
// The flow is three ordered milestones:
//   Discover → Train → Execute
//
// Every step moves along the same monotonic chain:
//   Locked → Available → Completed
// There are no backward transitions; only a full reset returns a step to
// its initial state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three ordered milestones of the guided flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Discover,
    Train,
    Execute,
}

impl Step {
    /// All steps in flow order.
    pub const ALL: [Step; 3] = [Step::Discover, Step::Train, Step::Execute];

    /// The key this step uses inside the persisted record.
    pub fn key(&self) -> &'static str {
        match self {
            Step::Discover => "discover",
            Step::Train => "train",
            Step::Execute => "execute",
        }
    }

    /// Human-facing title, as shown on the dashboard.
    pub fn title(&self) -> &'static str {
        match self {
            Step::Discover => "Discover",
            Step::Train => "Train",
            Step::Execute => "Execute",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discover" => Ok(Step::Discover),
            "train" => Ok(Step::Train),
            "execute" => Ok(Step::Execute),
            other => Err(format!(
                "unknown step '{}' (expected discover, train or execute)",
                other
            )),
        }
    }
}

/// The state of a single step.
///
/// Variants are declared in ascending order so `Ord` follows the chain:
/// `Locked < Available < Completed`. Upgrades are expressed as `max`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    #[default]
    Locked,
    Available,
    Completed,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepState::Locked => write!(f, "locked"),
            StepState::Available => write!(f, "available"),
            StepState::Completed => write!(f, "completed"),
        }
    }
}

impl StepState {
    /// Check whether moving from this state to `next` stays on the chain.
    ///
    /// Staying put is allowed (transitions are idempotent); going backwards
    /// is not.
    pub fn can_transition_to(&self, next: StepState) -> bool {
        next >= *self
    }

    /// The state after an upgrade request: never lower than the current one.
    pub fn upgrade(self, to: StepState) -> StepState {
        self.max(to)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepState::Completed)
    }
}

// record.rs — PlanProgress: the durable record and its transition functions.
//
// The record maps each step to the state that was explicitly written for it.
// Absent keys mean "nothing written yet". The record does not enforce the
// ordering invariants between steps; `derive` is authoritative for what a
// view shows, whatever the record contains.
//
// Transitions are pure: they take a record and return the next one. They only
// ever upgrade a step (see `StepState::upgrade`), which makes each of them
// idempotent.

use serde::{Deserialize, Deserializer, Serialize};

use crate::step::{Step, StepState};

/// The persisted progress record, stored as `{ "discover"?, "train"?, "execute"? }`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanProgress {
    #[serde(
        default,
        deserialize_with = "lenient_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub discover: Option<StepState>,

    #[serde(
        default,
        deserialize_with = "lenient_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub train: Option<StepState>,

    #[serde(
        default,
        deserialize_with = "lenient_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub execute: Option<StepState>,
}

/// An unrecognised value for one step reads as absent for that step only.
fn lenient_state<'de, D>(deserializer: D) -> Result<Option<StepState>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// An event that moves the record forward (or clears it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CompleteDiscover,
    CompleteTrain,
    CompleteExecute,
    Reset,
}

impl Transition {
    /// The transition that marks `step` as completed.
    pub fn complete(step: Step) -> Self {
        match step {
            Step::Discover => Transition::CompleteDiscover,
            Step::Train => Transition::CompleteTrain,
            Step::Execute => Transition::CompleteExecute,
        }
    }
}

impl PlanProgress {
    /// Decode a stored value. Missing, corrupt or non-object JSON yields the
    /// empty record. A repeated key keeps its last value.
    pub fn from_json(raw: &str) -> Self {
        // Going through `Value` collapses repeated keys before the struct
        // sees them; the derived impl would reject them as duplicates.
        let decoded = serde_json::from_str::<serde_json::Value>(raw)
            .and_then(serde_json::from_value::<Self>);
        match decoded {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("ignoring malformed plan progress ({}): {:?}", e, raw);
                Self::default()
            }
        }
    }

    /// Encode for storage. Absent steps are omitted.
    pub fn to_json(&self) -> String {
        // A struct of optional unit enums always serializes.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// The explicitly written state for `step`, if any.
    pub fn get(&self, step: Step) -> Option<StepState> {
        match step {
            Step::Discover => self.discover,
            Step::Train => self.train,
            Step::Execute => self.execute,
        }
    }

    fn slot_mut(&mut self, step: Step) -> &mut Option<StepState> {
        match step {
            Step::Discover => &mut self.discover,
            Step::Train => &mut self.train,
            Step::Execute => &mut self.execute,
        }
    }

    /// Return a copy with `step` raised to at least `to`.
    pub fn upgraded(mut self, step: Step, to: StepState) -> Self {
        let slot = self.slot_mut(step);
        *slot = Some(slot.unwrap_or_default().upgrade(to));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.discover.is_none() && self.train.is_none() && self.execute.is_none()
    }

    /// Compute the record that follows `transition`.
    pub fn apply(self, transition: Transition) -> Self {
        match transition {
            Transition::CompleteDiscover => self.complete_discover(),
            Transition::CompleteTrain => self.complete_train(),
            Transition::CompleteExecute => self.complete_execute(),
            Transition::Reset => Self::default(),
        }
    }

    /// Discover is done. Train's availability is derived from this, so
    /// nothing else is written.
    pub fn complete_discover(self) -> Self {
        self.upgraded(Step::Discover, StepState::Completed)
    }

    /// Train is done; also writes the explicit `execute = available` marker
    /// that gates Execute.
    pub fn complete_train(self) -> Self {
        self.upgraded(Step::Train, StepState::Completed)
            .upgraded(Step::Execute, StepState::Available)
    }

    pub fn complete_execute(self) -> Self {
        self.upgraded(Step::Execute, StepState::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_records() -> Vec<PlanProgress> {
        let values = [
            None,
            Some(StepState::Locked),
            Some(StepState::Available),
            Some(StepState::Completed),
        ];
        let mut out = Vec::new();
        for d in values {
            for t in values {
                for e in values {
                    out.push(PlanProgress {
                        discover: d,
                        train: t,
                        execute: e,
                    });
                }
            }
        }
        out
    }

    const TRANSITIONS: [Transition; 4] = [
        Transition::CompleteDiscover,
        Transition::CompleteTrain,
        Transition::CompleteExecute,
        Transition::Reset,
    ];

    #[test]
    fn complete_discover_on_empty_record() {
        let next = PlanProgress::default().complete_discover();
        assert_eq!(next.discover, Some(StepState::Completed));
        assert_eq!(next.train, None);
        assert_eq!(next.execute, None);
        assert_eq!(next.to_json(), r#"{"discover":"completed"}"#);
    }

    #[test]
    fn complete_train_writes_execute_marker() {
        let record = PlanProgress {
            discover: Some(StepState::Completed),
            train: Some(StepState::Completed),
            execute: None,
        };
        let next = record.complete_train();
        assert_eq!(next.execute, Some(StepState::Available));
        assert_eq!(next.complete_train(), next);
    }

    #[test]
    fn complete_train_does_not_downgrade_completed_execute() {
        let record = PlanProgress {
            discover: Some(StepState::Completed),
            train: Some(StepState::Completed),
            execute: Some(StepState::Completed),
        };
        assert_eq!(record.complete_train(), record);
    }

    #[test]
    fn every_transition_is_idempotent() {
        for record in all_records() {
            for t in TRANSITIONS {
                let once = record.apply(t);
                assert_eq!(once.apply(t), once, "{:?} on {:?}", t, record);
            }
        }
    }

    #[test]
    fn no_transition_lowers_a_step_except_reset() {
        for record in all_records() {
            for t in TRANSITIONS.into_iter().filter(|t| *t != Transition::Reset) {
                let next = record.apply(t);
                for step in Step::ALL {
                    assert!(
                        next.get(step).unwrap_or_default() >= record.get(step).unwrap_or_default(),
                        "{:?} lowered {} in {:?}",
                        t,
                        step,
                        record
                    );
                }
            }
        }
    }

    #[test]
    fn reset_clears_everything() {
        let record = PlanProgress::default()
            .complete_discover()
            .complete_train()
            .complete_execute();
        assert!(record.apply(Transition::Reset).is_empty());
    }

    #[test]
    fn from_json_tolerates_garbage() {
        for raw in ["", "not json", "null", "[]", "42", "\"completed\"", "{"] {
            assert!(PlanProgress::from_json(raw).is_empty(), "{:?}", raw);
        }
    }

    #[test]
    fn from_json_drops_only_the_bad_field() {
        let record =
            PlanProgress::from_json(r#"{"discover":"completed","train":"DONE","execute":7,"extra":1}"#);
        assert_eq!(record.discover, Some(StepState::Completed));
        assert_eq!(record.train, None);
        assert_eq!(record.execute, None);
    }

    #[test]
    fn from_json_reads_null_fields_as_absent() {
        let record = PlanProgress::from_json(r#"{"discover":null,"train":"available"}"#);
        assert_eq!(record.discover, None);
        assert_eq!(record.train, Some(StepState::Available));
    }

    #[test]
    fn from_json_keeps_last_of_repeated_keys() {
        let record =
            PlanProgress::from_json(r#"{"discover":"completed","discover":"completed"}"#);
        assert_eq!(record.discover, Some(StepState::Completed));

        let record = PlanProgress::from_json(
            r#"{"train":"available","discover":"available","discover":"completed"}"#,
        );
        assert_eq!(record.discover, Some(StepState::Completed));
        assert_eq!(record.train, Some(StepState::Available));
    }

    #[test]
    fn transition_for_step() {
        assert_eq!(Transition::complete(Step::Train), Transition::CompleteTrain);
    }
}

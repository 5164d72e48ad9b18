// store.rs — ProgressStore: the durable progress record and seen-flags.
//
// The store layers the progress semantics over an injectable KeyValueStore:
//   - the record lives under one key (`planProgress` by default) as JSON;
//   - each milestone seen-flag lives under its own key as "1" or absent.
//
// Nothing here fails past its own boundary. Reads fall back to the empty
// record / unset flags, writes are best-effort and logged when they fail.
// Transitions read, apply the pure transition function, write, then tell
// same-context listeners and event sinks.

use crate::config::StorageKeys;
use crate::derivation::derive;
use crate::events::{Journal, ProgressEvent};
use crate::gate::{Milestone, SeenFlags};
use crate::record::{PlanProgress, Transition};
use crate::step::{Step, StepState};
use crate::storage::KeyValueStore;
use crate::sync::{ChangeBus, Signal};

/// Marker value for a set seen-flag.
const FLAG_SET: &str = "1";

/// Progress record and seen-flags over a storage backend.
pub struct ProgressStore<S> {
    backend: S,
    keys: StorageKeys,
    bus: ChangeBus,
    journal: Journal,
}

impl<S: KeyValueStore> ProgressStore<S> {
    /// Create a store over `backend` with the default key names.
    pub fn new(backend: S) -> Self {
        Self::with_keys(backend, StorageKeys::default())
    }

    pub fn with_keys(backend: S, keys: StorageKeys) -> Self {
        Self {
            backend,
            keys,
            bus: ChangeBus::new(),
            journal: Journal::new(),
        }
    }

    /// Record transitions into `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// The same-context bus `Signal::Updated` is published on.
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Read the current record. Never fails: missing, corrupt or unreadable
    /// data reads as the empty record.
    pub fn read(&self) -> PlanProgress {
        match self.backend.get(&self.keys.progress) {
            Ok(Some(raw)) => PlanProgress::from_json(&raw),
            Ok(None) => PlanProgress::default(),
            Err(e) => {
                tracing::warn!("plan progress unreadable, treating as empty: {}", e);
                PlanProgress::default()
            }
        }
    }

    /// Persist `next` under the progress key. Best-effort.
    pub fn write(&self, next: &PlanProgress) {
        if let Err(e) = self.backend.set(&self.keys.progress, &next.to_json()) {
            tracing::warn!("failed to persist plan progress: {}", e);
        }
    }

    /// Current seen-flags. Unreadable flags count as unset.
    pub fn seen_flags(&self) -> SeenFlags {
        SeenFlags {
            train_unlocked: self.flag(&self.keys.train_seen),
            execute_unlocked: self.flag(&self.keys.execute_seen),
        }
    }

    /// Persist the flags that went from unset in `before` to set in `after`.
    ///
    /// Flags already set in `before` are not rewritten: a reset from another
    /// context between the read and this save must stay in effect.
    pub fn save_seen_flags(&self, before: SeenFlags, after: SeenFlags) {
        for milestone in [Milestone::Train, Milestone::Execute] {
            if after.is_seen(milestone) && !before.is_seen(milestone) {
                self.mark_seen(milestone);
            }
        }
    }

    pub fn mark_seen(&self, milestone: Milestone) {
        let key = self.seen_key(milestone);
        if let Err(e) = self.backend.set(key, FLAG_SET) {
            tracing::warn!(%milestone, "failed to persist seen-flag: {}", e);
        }
    }

    fn seen_key(&self, milestone: Milestone) -> &str {
        match milestone {
            Milestone::Train => &self.keys.train_seen,
            Milestone::Execute => &self.keys.execute_seen,
        }
    }

    fn flag(&self, key: &str) -> bool {
        match self.backend.get(key) {
            Ok(value) => value.as_deref() == Some(FLAG_SET),
            Err(e) => {
                tracing::warn!(key, "seen-flag unreadable, treating as unset: {}", e);
                false
            }
        }
    }

    pub fn complete_discover(&self) -> PlanProgress {
        self.apply(Transition::CompleteDiscover)
    }

    pub fn complete_train(&self) -> PlanProgress {
        self.apply(Transition::CompleteTrain)
    }

    pub fn complete_execute(&self) -> PlanProgress {
        self.apply(Transition::CompleteExecute)
    }

    /// Mark `step` as completed.
    pub fn complete(&self, step: Step) -> PlanProgress {
        self.apply(Transition::complete(step))
    }

    /// Clear the record and both durable seen-flags. Unconditional; the last
    /// writer wins against any concurrent transition.
    pub fn reset(&self) -> PlanProgress {
        self.apply(Transition::Reset)
    }

    /// Apply `transition` to the stored record and persist the result.
    pub fn apply(&self, transition: Transition) -> PlanProgress {
        let before = self.read();
        let after = before.apply(transition);

        if transition == Transition::Reset {
            for key in [&self.keys.progress, &self.keys.train_seen, &self.keys.execute_seen] {
                if let Err(e) = self.backend.remove(key) {
                    tracing::warn!(key = %key, "failed to clear during reset: {}", e);
                }
            }
            self.journal.record(&ProgressEvent::progress_reset());
        } else {
            self.write(&after);
            self.dispatch_changes(&before, &after);
        }

        tracing::debug!(?transition, record = %after.to_json(), "plan progress updated");
        self.bus.publish(&Signal::Updated);
        after
    }

    fn dispatch_changes(&self, before: &PlanProgress, after: &PlanProgress) {
        let (was, now) = (derive(before), derive(after));
        for step in Step::ALL {
            let (old, new) = (was.state_of(step), now.state_of(step));
            if old == new {
                continue;
            }
            if old == StepState::Locked {
                self.journal.record(&ProgressEvent::step_unlocked(step));
            }
            if new == StepState::Completed {
                self.journal.record(&ProgressEvent::step_completed(step));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::derive;
    use crate::error::StorageError;
    use crate::events::{Journal, JournalSink, TracingSink};
    use crate::storage::{DirStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Backend that fails every operation, like disabled browser storage.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn clear(&self) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
    }

    #[test]
    fn read_on_empty_store_is_empty_record() {
        let store = ProgressStore::new(MemoryStore::new());
        assert!(store.read().is_empty());
    }

    #[test]
    fn write_then_read_in_same_context() {
        let store = ProgressStore::new(MemoryStore::new());
        let record = PlanProgress::default().complete_discover();
        store.write(&record);
        assert_eq!(store.read(), record);
        assert_eq!(
            store.backend().get("planProgress").unwrap().as_deref(),
            Some(r#"{"discover":"completed"}"#)
        );
    }

    #[test]
    fn corrupt_record_reads_as_empty() {
        let store = ProgressStore::new(MemoryStore::new());
        store.backend().set("planProgress", "{not json").unwrap();
        assert!(store.read().is_empty());
        assert_eq!(derive(&store.read()), derive(&PlanProgress::default()));
    }

    #[test]
    fn broken_backend_degrades_to_initial_state() {
        let store = ProgressStore::new(BrokenStore);
        let after = store.complete_discover();
        // The transition still computes, but nothing was persisted.
        assert_eq!(after.discover, Some(StepState::Completed));
        assert!(store.read().is_empty());
        assert_eq!(store.seen_flags(), SeenFlags::default());
        store.mark_seen(Milestone::Train);
        store.reset();
    }

    #[test]
    fn transitions_are_idempotent_through_the_store() {
        let store = ProgressStore::new(MemoryStore::new());
        store.complete_discover();
        store.complete_train();
        let once = store.read();
        store.complete_train();
        assert_eq!(store.read(), once);
        assert_eq!(once.execute, Some(StepState::Available));
    }

    #[test]
    fn seen_flags_persist_as_marker_strings() {
        let store = ProgressStore::new(MemoryStore::new());
        store.save_seen_flags(
            SeenFlags::default(),
            SeenFlags::default().marked(Milestone::Execute),
        );
        assert_eq!(
            store.backend().get("__unlock_execute_seen").unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(store.backend().get("__unlock_train_seen").unwrap(), None);
        assert!(store.seen_flags().execute_unlocked);
        assert!(!store.seen_flags().train_unlocked);
    }

    #[test]
    fn seen_flag_requires_exact_marker() {
        let store = ProgressStore::new(MemoryStore::new());
        store.backend().set("__unlock_train_seen", "true").unwrap();
        assert!(!store.seen_flags().train_unlocked);
    }

    #[test]
    fn reset_clears_record_and_flags_but_not_other_keys() {
        let store = ProgressStore::new(MemoryStore::new());
        store.complete_discover();
        store.mark_seen(Milestone::Train);
        store.backend().set("kcTotal", "1").unwrap();

        let after = store.reset();
        assert!(after.is_empty());
        assert!(store.read().is_empty());
        assert_eq!(store.seen_flags(), SeenFlags::default());
        assert_eq!(store.backend().get("kcTotal").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn every_transition_publishes_updated() {
        let store = ProgressStore::new(MemoryStore::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = store.bus().on_change(move |signal| {
            assert_eq!(signal, &Signal::Updated);
            h.fetch_add(1, Ordering::SeqCst);
        });

        store.complete_discover();
        store.complete_discover();
        store.reset();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn custom_keys_are_honoured() {
        let keys = StorageKeys {
            progress: "demoProgress".to_string(),
            ..StorageKeys::default()
        };
        let store = ProgressStore::with_keys(MemoryStore::new(), keys);
        store.complete_discover();
        assert!(store.backend().get("demoProgress").unwrap().is_some());
        assert!(store.backend().get("planProgress").unwrap().is_none());
    }

    #[test]
    fn journal_records_only_real_changes() {
        let dir = tempdir().unwrap();
        let journal = dir.path().join("events.jsonl");
        let events = Journal::new().with_sink(JournalSink::open(&journal).unwrap());

        let store = ProgressStore::new(DirStore::open(dir.path().join("store")).unwrap())
            .with_journal(events);

        store.complete_discover();
        store.complete_discover();
        store.complete_train();

        let content = std::fs::read_to_string(&journal).unwrap();
        let types: Vec<String> = content
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                format!("{}:{}", v["event_type"].as_str().unwrap(), v["step"].as_str().unwrap())
            })
            .collect();
        assert_eq!(
            types,
            vec![
                "step_completed:discover",
                "step_unlocked:train",
                "step_completed:train",
                "step_unlocked:execute",
            ]
        );
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = ProgressStore::new(DirStore::open(dir.path()).unwrap());
            store.complete_discover();
            store.mark_seen(Milestone::Train);
        }

        {
            let store = ProgressStore::new(DirStore::open(dir.path()).unwrap());
            assert_eq!(store.read().discover, Some(StepState::Completed));
            assert!(store.seen_flags().train_unlocked);
        }
    }

    #[test]
    fn saving_flags_does_not_undo_a_reset() {
        let store = ProgressStore::new(MemoryStore::new());
        store.complete_discover();
        store.mark_seen(Milestone::Train);
        let before = store.seen_flags();

        // Another context resets before this one saves its gate outcome.
        store.reset();
        store.save_seen_flags(before, before.marked(Milestone::Execute));

        assert!(!store.seen_flags().train_unlocked);
        assert!(store.seen_flags().execute_unlocked);
    }

    #[test]
    fn journal_sinks_see_resets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let journal = Journal::new()
            .with_sink(TracingSink)
            .with_sink(JournalSink::open(&path).unwrap());
        let store = ProgressStore::new(MemoryStore::new()).with_journal(journal);
        assert_eq!(store.journal().sink_count(), 2);

        store.reset();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"event_type\":\"progress_reset\""));
    }
}

// view.rs — PlanView: the process-local controller behind a dashboard.
//
// A view remembers the last state it derived (never persisted) so the gate
// can detect transitions. Every sync is:
//   read record → derive → gate(previous, current, seen) → persist flags
// and hands back what to render plus an optional notification. The
// notification carries the delay the consumer should wait before showing
// it; scheduling is fire-and-forget and nothing else waits on it.
//
// Completion is sticky: an all-completed record keeps rendering as done
// until someone calls `reset`.

use std::time::Duration;

use serde::Serialize;

use crate::derivation::{derive, DerivedState};
use crate::events::ProgressEvent;
use crate::gate::{self, Milestone};
use crate::step::Step;
use crate::storage::KeyValueStore;
use crate::store::ProgressStore;
use crate::sync::{wants_resync, Signal};

/// Delay before a notification is shown, so it doesn't pop mid-transition.
pub const DEFAULT_NOTIFICATION_DELAY: Duration = Duration::from_millis(60);

/// How the user arrived at the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Entry {
    #[default]
    Direct,
    /// Straight from finishing the Discover flow.
    FromDiscover,
}

/// A notification the consumer should show after `delay`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PendingNotification {
    #[serde(rename = "for")]
    pub milestone: Milestone,
    #[serde(skip)]
    pub delay: Duration,
}

/// What a view should render after a sync.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ViewUpdate {
    pub state: DerivedState,
    pub notification: Option<PendingNotification>,
}

/// Process-local view over a shared progress store.
///
/// `session` is the session-scoped backend holding the discover-entry flag.
pub struct PlanView<'a, S, T> {
    store: &'a ProgressStore<S>,
    session: &'a T,
    entry: Entry,
    delay: Duration,
    previous: Option<DerivedState>,
}

impl<'a, S: KeyValueStore, T: KeyValueStore> PlanView<'a, S, T> {
    pub fn open(store: &'a ProgressStore<S>, session: &'a T, entry: Entry) -> Self {
        Self {
            store,
            session,
            entry,
            delay: DEFAULT_NOTIFICATION_DELAY,
            previous: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The last derived state, or the initial one before the first sync.
    pub fn state(&self) -> DerivedState {
        self.previous.unwrap_or_default()
    }

    /// First sync when the view opens. On the discover-entry path the
    /// session gate also runs; a durable-gate notification takes precedence.
    pub fn enter(&mut self) -> ViewUpdate {
        let mut update = self.sync();
        if self.entry == Entry::FromDiscover {
            let from_session = self.discover_entry(&update.state);
            if update.notification.is_none() {
                update.notification = from_session.map(|m| self.announce(m));
            }
        }
        update
    }

    /// Re-derive from storage and run the durable gate.
    pub fn sync(&mut self) -> ViewUpdate {
        let state = derive(&self.store.read());
        let seen = self.store.seen_flags();
        let outcome = gate::evaluate(self.previous.as_ref(), &state, seen);

        if outcome.seen != seen {
            self.store.save_seen_flags(seen, outcome.seen);
        }
        self.previous = Some(state);

        tracing::debug!(
            discover = %state.discover,
            train = %state.train,
            execute = %state.execute,
            "plan view synced"
        );

        ViewUpdate {
            state,
            notification: outcome.notification.map(|m| self.announce(m)),
        }
    }

    /// React to a change signal. `None` when the signal is irrelevant.
    pub fn handle(&mut self, signal: &Signal) -> Option<ViewUpdate> {
        if wants_resync(signal, &self.store.keys().progress) {
            Some(self.sync())
        } else {
            tracing::debug!(%signal, "ignoring change signal");
            None
        }
    }

    /// Whether the view lets the user enter `step` right now.
    pub fn can_start(&self, step: Step) -> bool {
        self.state().can_start(step)
    }

    fn announce(&self, milestone: Milestone) -> PendingNotification {
        tracing::info!(%milestone, "unlock notification pending");
        self.store
            .journal()
            .record(&ProgressEvent::notification_pending(milestone));
        PendingNotification {
            milestone,
            delay: self.delay,
        }
    }

    fn discover_entry(&self, state: &DerivedState) -> Option<Milestone> {
        let key = &self.store.keys().discover_entry_seen;
        let seen = match self.session.get(key) {
            Ok(value) => value.as_deref() == Some("1"),
            Err(e) => {
                tracing::warn!("session flag unreadable, treating as unset: {}", e);
                false
            }
        };

        let (notification, now_seen) = gate::discover_entry(state, seen);
        if now_seen && !seen {
            if let Err(e) = self.session.set(key, "1") {
                tracing::warn!("failed to persist session flag: {}", e);
            }
        }
        notification
    }
}

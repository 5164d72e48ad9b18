//! # dte-progress
//!
//! Plan-progress state machine for the Discover → Train → Execute flow.
//!
//! Progress is a small record persisted in a shared key/value store. Any
//! number of contexts (tabs, windows, processes) can look at the same store;
//! each one derives what to show from the record and announces each unlock
//! at most once.
//!
//! ## Key components
//!
//! - [`KeyValueStore`] — injectable storage backend ([`MemoryStore`], [`DirStore`])
//! - [`ProgressStore`] — the durable record and seen-flags, with the
//!   transitions (`complete_discover`, `complete_train`, `complete_execute`, `reset`)
//! - [`PlanProgress`] — the record and its pure transition functions
//! - [`derive`] — record → [`DerivedState`] (the states a view renders)
//! - [`gate::evaluate`] — one-time unlock notifications
//! - [`ChangeBus`] / [`Signal`] — cross-context change signals
//! - [`PlanView`] — the process-local controller tying it together
//! - [`ProgressEvent`] / [`Journal`] — progress journal
//! - [`scoring`] — the Execute flow's knowledge-check side channel

pub mod config;
pub mod derivation;
pub mod error;
pub mod events;
pub mod gate;
pub mod record;
pub mod scoring;
pub mod step;
pub mod storage;
pub mod store;
pub mod sync;
pub mod view;

pub use config::{ProgressConfig, StorageKeys};
pub use derivation::{derive, DerivedState};
pub use error::{ConfigError, EventError, StorageError};
pub use events::{EventKind, EventSink, Journal, JournalSink, ProgressEvent, TracingSink};
pub use gate::{GateOutcome, Milestone, SeenFlags};
pub use record::{PlanProgress, Transition};
pub use step::{Step, StepState};
pub use storage::{DirStore, KeyValueStore, MemoryStore};
pub use store::ProgressStore;
pub use sync::{wants_resync, ChangeBus, Signal, Subscription, UPDATED_EVENT};
pub use view::{Entry, PendingNotification, PlanView, ViewUpdate, DEFAULT_NOTIFICATION_DELAY};

// events.rs — Progress journal: what happened to the plan, and when.
//
// Every journal entry is a timestamp plus an `EventKind`, flattened into one
// JSON object tagged by `event_type`:
//
//   {"timestamp":"…","event_type":"step_unlocked","step":"train"}
//
// The store records step changes and resets; the view records notifications
// it hands to its consumer (still pending their display delay). The journal
// is write-only from the core's point of view: progress is never rebuilt
// from it, so a sink that fails only costs a log line.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::gate::Milestone;
use crate::step::Step;

/// What happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventKind {
    /// A step's derived state became `completed`. Repeats of an idempotent
    /// transition record nothing.
    StepCompleted { step: Step },
    /// A step's derived state left `locked`.
    StepUnlocked { step: Step },
    /// A view handed out an unlock notification; the consumer shows it after
    /// the configured delay.
    NotificationPending { milestone: Milestone },
    /// The record and durable seen-flags were cleared.
    ProgressReset,
}

impl EventKind {
    /// The `event_type` tag written to the journal.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::StepCompleted { .. } => "step_completed",
            EventKind::StepUnlocked { .. } => "step_unlocked",
            EventKind::NotificationPending { .. } => "notification_pending",
            EventKind::ProgressReset => "progress_reset",
        }
    }

    /// The step the event is about, if any.
    pub fn step(&self) -> Option<Step> {
        match self {
            EventKind::StepCompleted { step } | EventKind::StepUnlocked { step } => Some(*step),
            EventKind::NotificationPending { milestone } => Some(milestone.step()),
            EventKind::ProgressReset => None,
        }
    }
}

/// One journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ProgressEvent {
    /// Stamp `kind` with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn step_completed(step: Step) -> Self {
        Self::now(EventKind::StepCompleted { step })
    }

    pub fn step_unlocked(step: Step) -> Self {
        Self::now(EventKind::StepUnlocked { step })
    }

    pub fn notification_pending(milestone: Milestone) -> Self {
        Self::now(EventKind::NotificationPending { milestone })
    }

    pub fn progress_reset() -> Self {
        Self::now(EventKind::ProgressReset)
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.name()
    }
}

/// Destination for journal entries.
pub trait EventSink: Send {
    fn send(&self, event: &ProgressEvent) -> Result<(), EventError>;
}

/// Mirrors the journal into the `tracing` log.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn send(&self, event: &ProgressEvent) -> Result<(), EventError> {
        match event.kind {
            EventKind::StepCompleted { step } => tracing::info!(%step, "step completed"),
            EventKind::StepUnlocked { step } => tracing::info!(%step, "step unlocked"),
            EventKind::NotificationPending { milestone } => {
                tracing::info!(%milestone, "unlock notification pending")
            }
            EventKind::ProgressReset => tracing::info!("progress reset"),
        }
        Ok(())
    }
}

/// Appends entries, one JSON object per line, to a journal file that stays
/// open for the sink's lifetime.
pub struct JournalSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JournalSink {
    /// Open (or create) the journal at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| EventError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| EventError::IoError {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JournalSink {
    fn send(&self, event: &ProgressEvent) -> Result<(), EventError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One write per entry keeps lines whole between appending processes.
        file.write_all(&line).map_err(|source| EventError::IoError {
            path: self.path.clone(),
            source,
        })
    }
}

/// The set of sinks a store and its views record into.
#[derive(Default)]
pub struct Journal {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Journal {
    /// A journal with no sinks; recording is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.add_sink(Box::new(sink));
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Hand `event` to every sink. A failing sink is logged and skipped.
    pub fn record(&self, event: &ProgressEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(event_type = event.event_type(), "journal sink failed: {}", e);
            }
        }
    }
}

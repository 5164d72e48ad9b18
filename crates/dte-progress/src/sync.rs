// sync.rs — Cross-context change signals and the subscription bus.
//
// Three signals can make a view re-derive:
//   - StorageChanged: another context wrote to the shared store. Carries the
//     changed key when the platform knows it.
//   - VisibilityChanged: the context came back to the foreground.
//   - Updated: the same context wrote progress (`planprogress:updated`), so
//     views don't have to wait for a storage round-trip.
//
// The bus only fans signals out. Deciding what a signal means is
// `wants_resync`, and re-deriving is the view's job, so both can be tested
// without any platform signal source.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Name of the same-context update signal.
pub const UPDATED_EVENT: &str = "planprogress:updated";

/// A change notification delivered to views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    StorageChanged { key: Option<String> },
    VisibilityChanged { visible: bool },
    Updated,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::StorageChanged { key: Some(key) } => write!(f, "storage:{}", key),
            Signal::StorageChanged { key: None } => write!(f, "storage:*"),
            Signal::VisibilityChanged { visible } => write!(f, "visibility:{}", visible),
            Signal::Updated => f.write_str(UPDATED_EVENT),
        }
    }
}

/// Whether `signal` should make a view re-read `progress_key`.
pub fn wants_resync(signal: &Signal, progress_key: &str) -> bool {
    match signal {
        Signal::StorageChanged { key: None } => true,
        Signal::StorageChanged { key: Some(key) } => key == progress_key,
        Signal::VisibilityChanged { visible } => *visible,
        Signal::Updated => true,
    }
}

type Callback = Arc<dyn Fn(&Signal) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

/// Fan-out of [`Signal`]s to subscribed callbacks.
///
/// Cloning gives another handle onto the same set of listeners.
#[derive(Clone, Default)]
pub struct ChangeBus {
    listeners: Arc<Mutex<Listeners>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. It stays attached until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(callback)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Deliver `signal` to every live callback, in subscription order.
    ///
    /// Callbacks run without the listener lock held, so they may subscribe,
    /// unsubscribe or publish themselves.
    pub fn publish(&self, signal: &Signal) {
        let callbacks: Vec<Callback> = {
            let listeners = self
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners.entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        tracing::debug!(%signal, listeners = callbacks.len(), "publishing change signal");
        for callback in callbacks {
            callback(signal);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries
            .len()
    }
}

/// Handle returned by [`ChangeBus::on_change`]; detaches on drop.
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Detach now instead of at drop.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut listeners = listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

//! Process-wide job store shared by the push listener, the poll drivers and the
//! request initiators.
//!
//! Every mutation goes through [`SharedStore::dispatch`], which applies the pure
//! reducer under a lock and then publishes a [`StoreEvent`] describing which job
//! statuses changed. Readers take [`StoreSnapshot`]s; nothing outside this
//! module writes the store directly.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracker_core::{
    apply, status_transitions, Action, JobStore, StatusTransition, StoreSnapshot,
};
use tracker_logging::tracker_debug;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Published after every reducer application.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    /// Monotonic count of applied actions.
    pub version: u64,
    pub transitions: Vec<StatusTransition>,
}

#[derive(Default)]
struct Versioned {
    store: JobStore,
    version: u64,
}

#[derive(Clone)]
pub struct SharedStore {
    state: Arc<Mutex<Versioned>>,
    events: broadcast::Sender<StoreEvent>,
}

impl SharedStore {
    pub fn new(store: JobStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(Versioned { store, version: 0 })),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Versioned> {
        // The reducer is pure; a panic inside it leaves the previous store intact.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `action` and notifies subscribers. Returns the new version.
    pub fn dispatch(&self, action: Action) -> u64 {
        let name = action.name();
        let event = {
            let mut guard = self.lock();
            let before = guard.store.clone();
            let after = apply(std::mem::take(&mut guard.store), action.clone());
            let transitions = status_transitions(&before, &after, &action);
            guard.store = after;
            guard.version += 1;
            StoreEvent {
                version: guard.version,
                transitions,
            }
        };

        tracker_debug!(
            "dispatch {} version={} transitions={}",
            name,
            event.version,
            event.transitions.len()
        );
        let version = event.version;
        // No subscribers is fine; the store is still updated.
        let _ = self.events.send(event);
        version
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().store.snapshot()
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Runs `read` against the live store without cloning it.
    pub fn with_store<R>(&self, read: impl FnOnce(&JobStore) -> R) -> R {
        read(&self.lock().store)
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new(JobStore::default())
    }
}

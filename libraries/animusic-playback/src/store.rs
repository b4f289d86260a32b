//! Playback state store
//!
//! Single source of truth for what the UI renders. Holds the current
//! [`Snapshot`] and notifies subscribers synchronously, in subscription
//! order, every time the session or the sleep timer publishes a new one.

use crate::types::{PlaybackState, SleepTimerSnapshot, Snapshot};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tracing::trace;

type Callback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

struct StoreInner {
    snapshot: Snapshot,
    subscribers: Vec<(u64, Callback)>,
    next_id: u64,
}

/// Observable holder of the current playback and sleep timer state
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("StateStore")
            .field("snapshot", &inner.snapshot)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl StateStore {
    /// Create a store holding the initial Idle/Inactive snapshot
    pub fn new(fade_window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                snapshot: Snapshot {
                    playback: Arc::new(PlaybackState::default()),
                    sleep_timer: Arc::new(SleepTimerSnapshot::inactive(fade_window)),
                },
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    /// Register a callback invoked with every new snapshot
    ///
    /// Callbacks run on the publishing task and must not block; long work
    /// should be handed off by the subscriber. Dropping the returned
    /// [`Subscription`] unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));
        trace!(subscriber = id, "Subscribed to playback state");

        Subscription {
            store: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Publish a new playback state derived from the current one
    pub(crate) fn update_playback<F>(&self, f: F)
    where
        F: FnOnce(&PlaybackState) -> PlaybackState,
    {
        self.publish(|snapshot| {
            snapshot.playback = Arc::new(f(&snapshot.playback));
        });
    }

    /// Publish a playback state, replacing the current one
    pub(crate) fn set_playback(&self, state: PlaybackState) {
        self.update_playback(|_| state);
    }

    /// Publish a new sleep timer snapshot
    pub(crate) fn set_sleep_timer(&self, timer: SleepTimerSnapshot) {
        self.publish(|snapshot| {
            snapshot.sleep_timer = Arc::new(timer);
        });
    }

    fn publish<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Snapshot),
    {
        let (snapshot, subscribers) = {
            let mut inner = self.lock();
            mutate(&mut inner.snapshot);
            let callbacks: Vec<Callback> = inner
                .subscribers
                .iter()
                .map(|(_, cb)| Arc::clone(cb))
                .collect();
            (inner.snapshot.clone(), callbacks)
        };

        // Lock released: callbacks may read the store or unsubscribe
        for callback in subscribers {
            callback(&snapshot);
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        lock_inner(&self.inner)
    }
}

fn lock_inner(inner: &Mutex<StoreInner>) -> MutexGuard<'_, StoreInner> {
    inner
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Handle returned by [`StateStore::subscribe`]
///
/// The callback stays registered until this is dropped or
/// [`unsubscribe`](Subscription::unsubscribe) is called.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<Mutex<StoreInner>>,
    id: Option<u64>,
}

impl Subscription {
    /// Stop receiving snapshots
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(store) = self.store.upgrade() {
            lock_inner(&store).subscribers.retain(|(sid, _)| *sid != id);
            trace!(subscriber = id, "Unsubscribed from playback state");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

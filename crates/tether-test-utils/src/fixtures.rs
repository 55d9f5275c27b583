//! Reusable fixtures for lifetime tests.
//!
//! - [`DropLedger`] / [`Tracked`]: count how often each tracked value is
//!   dropped, in first-drop order.
//! - [`DeleterLog`]: hands out [`Deleter`]s that append a label to a
//!   shared log.
//! - [`RecordingHook`]: a [`LifecycleHook`] that keeps every event.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tether_core::{Deleter, EventKind, LifecycleEvent, LifecycleHook, SharedHook};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not hide the ledger from the asserting one.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── DropLedger ─────────────────────────────────────────────────────

/// Shared record of drops, keyed by value id.
///
/// Cloning the ledger shares the record.
#[derive(Clone, Default)]
pub struct DropLedger {
    drops: Arc<Mutex<IndexMap<u64, usize>>>,
}

impl DropLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a value that reports its drop to this ledger.
    pub fn track(&self, id: u64) -> Tracked {
        Tracked {
            id,
            ledger: self.clone(),
        }
    }

    /// How many times the value with `id` has been dropped.
    pub fn drops(&self, id: u64) -> usize {
        lock(&self.drops).get(&id).copied().unwrap_or(0)
    }

    /// Total drops across all ids.
    pub fn total(&self) -> usize {
        lock(&self.drops).values().sum()
    }

    /// Ids in the order they were first dropped.
    pub fn drop_order(&self) -> Vec<u64> {
        lock(&self.drops).keys().copied().collect()
    }

    /// Whether every id in `ids` was dropped exactly once.
    pub fn all_dropped_once(&self, ids: impl IntoIterator<Item = u64>) -> bool {
        let drops = lock(&self.drops);
        ids.into_iter()
            .all(|id| drops.get(&id).copied() == Some(1))
    }

    fn record(&self, id: u64) {
        *lock(&self.drops).entry(id).or_insert(0) += 1;
    }
}

/// A value that records its own drop in a [`DropLedger`].
pub struct Tracked {
    id: u64,
    ledger: DropLedger,
}

impl Tracked {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.ledger.record(self.id);
    }
}

impl std::fmt::Debug for Tracked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tracked({})", self.id)
    }
}

// ── DeleterLog ─────────────────────────────────────────────────────

/// Shared log that custom deleters append to.
#[derive(Clone, Default)]
pub struct DeleterLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl DeleterLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A deleter that appends `label` to this log, then drops the object.
    pub fn deleter<T: 'static>(&self, label: impl Into<String>) -> Deleter<T> {
        let label = label.into();
        let entries = Arc::clone(&self.entries);
        Deleter::with_box(move |object: Box<T>| {
            lock(&entries).push(label);
            drop(object);
        })
    }

    /// Snapshot of the log.
    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Number of entries equal to `label`.
    pub fn count(&self, label: &str) -> usize {
        lock(&self.entries).iter().filter(|e| *e == label).count()
    }
}

// ── RecordingHook ──────────────────────────────────────────────────

/// Hook that keeps every event it sees, in order.
#[derive(Default)]
pub struct RecordingHook {
    events: Mutex<SmallVec<[LifecycleEvent; 16]>>,
}

impl RecordingHook {
    /// A new recorder, plus the same recorder as a hook to attach.
    pub fn new() -> (Arc<Self>, SharedHook) {
        let recorder = Arc::new(Self::default());
        let hook: SharedHook = recorder.clone();
        (recorder, hook)
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        lock(&self.events).to_vec()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        lock(&self.events).iter().map(LifecycleEvent::kind).collect()
    }

    /// Number of recorded events of `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl LifecycleHook for RecordingHook {
    fn on_event(&self, event: &LifecycleEvent) {
        lock(&self.events).push(*event);
    }
}

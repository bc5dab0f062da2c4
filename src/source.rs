//! The external contact data source and an in-memory implementation.
//!
//! A [`DataSource`] is opaque to the pipeline: it can load every row and it
//! can push change notifications. Nothing else is assumed about it.

use crate::error::{Result, SearchError};
use crate::types::{RawRecord, Record};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Callback invoked by a data source whenever its contents change.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// A contact storage backend.
pub trait DataSource: Send + Sync {
    /// Load every row currently stored. May be slow.
    fn load_all(&self) -> Result<Vec<RawRecord>>;

    /// Register for change notifications.
    ///
    /// The callback may fire from any thread, any number of times, until the
    /// returned subscription is cancelled.
    fn subscribe_to_changes(&self, on_change: ChangeCallback)
        -> Result<Box<dyn SourceSubscription>>;
}

/// Handle to a registered change callback.
pub trait SourceSubscription: Send {
    /// Stop receiving notifications. Calling this more than once is a no-op.
    fn cancel(&self);
}

/// The seed contacts appended to every demo data set.
pub fn demo_contacts() -> Vec<Record> {
    [
        ("Simon", "23465123"),
        ("Amber", "356345623"),
        ("Sharon", "3453453"),
        ("Tom", "682649834"),
        ("Cris", "348761"),
        ("Anna", "3676174"),
        ("Will", "34548772"),
        ("Harry", "65473"),
        ("Peter", "456773"),
        ("Zoe", "788572434"),
    ]
    .into_iter()
    .map(|(name, number)| Record::new(name, number))
    .collect()
}

struct SourceState {
    rows: RwLock<Vec<RawRecord>>,
    observers: Mutex<HashMap<u64, ChangeCallback>>,
    next_observer: AtomicU64,

    load_count: AtomicUsize,
    subscribe_count: AtomicUsize,

    fail_subscribe: Mutex<Option<String>>,
    fail_load: Mutex<Option<String>>,
    load_delay: Mutex<Duration>,
    queued_delays: Mutex<VecDeque<Duration>>,
}

/// A mutable, in-process data source.
///
/// Every mutation notifies registered observers, so it behaves like a
/// content provider for the pipeline. It also records how often it was
/// loaded and subscribed to, and can be told to fail.
#[derive(Clone)]
pub struct InMemorySource {
    state: Arc<SourceState>,
}

impl InMemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// Create a source holding the given records.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self::with_rows(records.into_iter().map(RawRecord::from).collect())
    }

    /// Create a source holding raw rows, which may include malformed ones.
    pub fn with_rows(rows: Vec<RawRecord>) -> Self {
        Self {
            state: Arc::new(SourceState {
                rows: RwLock::new(rows),
                observers: Mutex::new(HashMap::new()),
                next_observer: AtomicU64::new(1),
                load_count: AtomicUsize::new(0),
                subscribe_count: AtomicUsize::new(0),
                fail_subscribe: Mutex::new(None),
                fail_load: Mutex::new(None),
                load_delay: Mutex::new(Duration::ZERO),
                queued_delays: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Create a source seeded with [`demo_contacts`].
    pub fn demo() -> Self {
        Self::with_records(demo_contacts())
    }

    /// Parse a JSON array of `{"name": .., "number": ..}` rows.
    pub fn from_json(json: &str) -> Result<Self> {
        let rows: Vec<RawRecord> = serde_json::from_str(json)?;
        Ok(Self::with_rows(rows))
    }

    // --- Mutation ---

    /// Replace every row and notify observers.
    pub fn replace(&self, records: Vec<Record>) {
        *self.state.rows.write() = records.into_iter().map(RawRecord::from).collect();
        self.notify();
    }

    /// Append a record and notify observers.
    pub fn push(&self, record: Record) {
        self.push_raw(record.into());
    }

    /// Append a raw row and notify observers.
    pub fn push_raw(&self, row: RawRecord) {
        self.state.rows.write().push(row);
        self.notify();
    }

    /// Remove every row with the given name and notify observers.
    ///
    /// Returns how many rows were removed.
    pub fn remove(&self, name: &str) -> usize {
        let removed = {
            let mut rows = self.state.rows.write();
            let before = rows.len();
            rows.retain(|row| row.name.as_deref() != Some(name));
            before - rows.len()
        };
        if removed > 0 {
            self.notify();
        }
        removed
    }

    /// Fire a change notification without touching the data.
    pub fn notify(&self) {
        let callbacks: Vec<ChangeCallback> =
            self.state.observers.lock().values().cloned().collect();
        trace!(observers = callbacks.len(), "notifying change observers");
        for callback in callbacks {
            callback();
        }
    }

    // --- Fault injection ---

    /// Make subsequent `subscribe_to_changes` calls fail (`None` to clear).
    pub fn fail_subscribe(&self, reason: Option<&str>) {
        *self.state.fail_subscribe.lock() = reason.map(str::to_string);
    }

    /// Make subsequent `load_all` calls fail (`None` to clear).
    pub fn fail_load(&self, reason: Option<&str>) {
        *self.state.fail_load.lock() = reason.map(str::to_string);
    }

    /// Delay applied to every load that has no queued delay.
    pub fn set_load_delay(&self, delay: Duration) {
        *self.state.load_delay.lock() = delay;
    }

    /// Delay applied to the next load only. Queued delays are consumed in order.
    pub fn queue_load_delay(&self, delay: Duration) {
        self.state.queued_delays.lock().push_back(delay);
    }

    // --- Introspection ---

    /// Number of `load_all` calls so far.
    pub fn load_count(&self) -> usize {
        self.state.load_count.load(Ordering::SeqCst)
    }

    /// Number of successful `subscribe_to_changes` calls so far.
    pub fn subscribe_count(&self) -> usize {
        self.state.subscribe_count.load(Ordering::SeqCst)
    }

    /// Number of change callbacks currently registered.
    pub fn active_subscriptions(&self) -> usize {
        self.state.observers.lock().len()
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for InMemorySource {
    fn load_all(&self) -> Result<Vec<RawRecord>> {
        self.state.load_count.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.state.fail_load.lock().clone() {
            return Err(SearchError::SourceUnavailable(reason));
        }

        // Rows are read up front; the delay models a slow cursor.
        let rows = self.state.rows.read().clone();
        let delay = self
            .state
            .queued_delays
            .lock()
            .pop_front()
            .unwrap_or(*self.state.load_delay.lock());
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        Ok(rows)
    }

    fn subscribe_to_changes(
        &self,
        on_change: ChangeCallback,
    ) -> Result<Box<dyn SourceSubscription>> {
        if let Some(reason) = self.state.fail_subscribe.lock().clone() {
            return Err(SearchError::SourceUnavailable(reason));
        }

        let id = self.state.next_observer.fetch_add(1, Ordering::SeqCst);
        self.state.observers.lock().insert(id, on_change);
        self.state.subscribe_count.fetch_add(1, Ordering::SeqCst);
        debug!(observer = id, "change observer registered");

        Ok(Box::new(InMemorySubscription {
            id,
            state: Arc::downgrade(&self.state),
            cancelled: AtomicBool::new(false),
        }))
    }
}

struct InMemorySubscription {
    id: u64,
    state: Weak<SourceState>,
    cancelled: AtomicBool,
}

impl SourceSubscription for InMemorySubscription {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(state) = self.state.upgrade() {
            state.observers.lock().remove(&self.id);
            debug!(observer = self.id, "change observer unregistered");
        }
    }
}

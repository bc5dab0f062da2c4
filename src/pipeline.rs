//! The shared filtered-view cache and the pipeline session behind it.
//!
//! A session is one pipeline thread running watch -> load -> combine. It is
//! started when the first observer attaches and stopped (joined, with the
//! change subscription released) when the last one detaches. All observers
//! share the session's output through a replay-1 [`SubscriptionManager`].

use crate::debounce::Debouncer;
use crate::error::{Result, SearchError};
use crate::filter::Combiner;
use crate::search::SearchConfig;
use crate::snapshot::{ChangeWatcher, SnapshotLoader};
use crate::source::DataSource;
use crate::subscriptions::{
    DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
    ViewEvent,
};
use crate::types::{FilteredView, ViewState};
use crossbeam_channel::{bounded, never, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

struct Session {
    id: u64,
    /// Dropping this wakes the pipeline thread and ends it.
    shutdown: Sender<()>,
    worker: JoinHandle<()>,
}

impl Session {
    fn stop(self) {
        drop(self.shutdown);
        if self.worker.thread().id() != thread::current().id() {
            let _ = self.worker.join();
        }
        info!(session = self.id, "pipeline stopped");
    }
}

#[derive(Default)]
struct SessionSlot {
    running: Option<Session>,
    started: u64,
    /// Whether observers may attach at all.
    permitted: bool,
}

impl SessionSlot {
    fn is_current(&self, id: u64) -> bool {
        self.running.as_ref().map(|s| s.id) == Some(id)
    }
}

struct ViewInner {
    source: Arc<dyn DataSource>,
    queries: Arc<Debouncer>,
    thread_name: String,
    observers: SubscriptionManager<ViewEvent>,
    /// Lock order: `session` before `observers`.
    session: Mutex<SessionSlot>,
}

/// Multicast, replay-latest access to the filtered view.
///
/// At most one pipeline session runs no matter how many observers there
/// are. A new observer first receives the most recently computed view (if
/// any), then live updates. Observers can only attach while the view is
/// permitted, which starts out false.
#[derive(Clone)]
pub struct SharedView {
    inner: Arc<ViewInner>,
}

impl SharedView {
    pub fn new(source: Arc<dyn DataSource>, queries: Arc<Debouncer>, config: &SearchConfig) -> Self {
        Self {
            inner: Arc::new(ViewInner {
                source,
                queries,
                thread_name: config.thread_name.clone(),
                observers: SubscriptionManager::with_config(SubscriptionConfig {
                    buffer_size: config.buffer_size,
                    replay_latest: true,
                }),
                session: Mutex::new(SessionSlot::default()),
            }),
        }
    }

    /// Attach an observer, starting the pipeline if it is not running.
    ///
    /// Fails with `PermissionDenied` unless the view is permitted.
    pub fn subscribe(&self) -> Result<ViewSubscription> {
        let mut slot = self.inner.session.lock();
        if !slot.permitted {
            return Err(SearchError::PermissionDenied);
        }
        let handle = self.inner.observers.subscribe();

        if slot.running.is_none() {
            match self.inner.spawn_session(&mut slot) {
                Ok(session) => slot.running = Some(session),
                Err(e) => {
                    self.inner.observers.unsubscribe(handle.id);
                    return Err(e);
                }
            }
        }

        Ok(ViewSubscription {
            handle,
            view: Arc::clone(&self.inner),
            state: ViewState::Loading,
        })
    }

    /// Allow or forbid observers. Returns false if nothing changed.
    ///
    /// Forbidding drops every observer with `PermissionRevoked` and stops
    /// the pipeline. The flag is flipped under the session lock, so no
    /// `subscribe` can slip in between the check and the teardown.
    pub fn set_permitted(&self, permitted: bool) -> bool {
        let (closed, stopped) = {
            let mut slot = self.inner.session.lock();
            if slot.permitted == permitted {
                return false;
            }
            slot.permitted = permitted;
            if permitted {
                return true;
            }
            let closed = self
                .inner
                .observers
                .close_all(None, DropReason::PermissionRevoked);
            (closed, slot.running.take())
        };
        debug!(dropped = closed, "observers dropped after permission revoked");
        if let Some(session) = stopped {
            session.stop();
        }
        true
    }

    pub fn is_permitted(&self) -> bool {
        self.inner.session.lock().permitted
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.subscription_count()
    }

    /// Whether a pipeline session is running.
    pub fn is_running(&self) -> bool {
        self.inner.session.lock().running.is_some()
    }

    /// How many pipeline sessions have been started so far.
    pub fn sessions_started(&self) -> u64 {
        self.inner.session.lock().started
    }

    /// The view a new observer would be replayed.
    pub fn latest(&self) -> Option<FilteredView> {
        self.inner
            .observers
            .latest()
            .and_then(|event| event.view().cloned())
    }
}

impl ViewInner {
    fn spawn_session(self: &Arc<Self>, slot: &mut SessionSlot) -> Result<Session> {
        let id = slot.started + 1;
        let (shutdown, stop_signal) = bounded::<()>(0);
        let inner = Arc::clone(self);
        let worker = thread::Builder::new()
            .name(format!("{}-pipeline", self.thread_name))
            .spawn(move || inner.run(id, stop_signal))
            .map_err(|e| SearchError::Spawn(e.to_string()))?;

        slot.started = id;
        info!(session = id, "pipeline started");
        Ok(Session {
            id,
            shutdown,
            worker,
        })
    }

    fn run(&self, id: u64, stop_signal: Receiver<()>) {
        let watcher = match ChangeWatcher::activate(self.source.as_ref()) {
            Ok(watcher) => watcher,
            Err(e) => return self.fail(id, e),
        };
        let queries = self.queries.subscribe();
        let (loader, loads) =
            SnapshotLoader::new(Arc::clone(&self.source), &format!("{}-load", self.thread_name));
        let mut combiner = Combiner::new();
        let mut loading = false;
        let idle = never();

        loop {
            // While a load is in flight, further triggers stay coalesced in
            // the watcher's slot and are picked up once it completes.
            let triggers = if loading { &idle } else { watcher.triggers() };

            let keep_running = select! {
                recv(stop_signal) -> _ => false,
                recv(triggers) -> _ => match loader.start() {
                    Ok(_) => {
                        loading = true;
                        true
                    }
                    Err(e) => {
                        self.fail(id, e);
                        false
                    }
                },
                recv(loads) -> outcome => match outcome {
                    Ok(outcome) if loader.is_current(outcome.generation) => {
                        loading = false;
                        match outcome.result {
                            Ok(snapshot) => {
                                debug!(session = id, records = snapshot.len(), "snapshot loaded");
                                combiner
                                    .on_snapshot(snapshot)
                                    .map_or(true, |view| self.publish(id, view))
                            }
                            Err(e) => {
                                self.fail(id, e);
                                false
                            }
                        }
                    }
                    Ok(_) => true,
                    Err(_) => false,
                },
                recv(queries.receiver) -> query => match query {
                    Ok(query) => combiner
                        .on_query(query)
                        .map_or(true, |view| self.publish(id, view)),
                    Err(_) => {
                        self.fail(id, SearchError::Disconnected);
                        false
                    }
                },
            };

            if !keep_running {
                break;
            }
        }

        self.queries.unsubscribe(queries.id);
        debug!(session = id, "pipeline loop exited");
    }

    /// Publish a view. Returns false if this session should stop.
    fn publish(&self, id: u64, view: FilteredView) -> bool {
        let mut slot = self.session.lock();
        if !slot.is_current(id) {
            return false;
        }

        debug!(session = id, records = view.len(), query = view.query(), "filtered view published");
        let remaining = self.observers.publish(ViewEvent::View { view });
        if remaining == 0 {
            // Every handle was dropped without detaching.
            slot.running.take();
            info!(session = id, "pipeline stopped: no observers left");
            return false;
        }
        true
    }

    /// Deliver a terminal error to every observer and retire the session.
    fn fail(&self, id: u64, error: SearchError) {
        let mut slot = self.session.lock();
        if !slot.is_current(id) {
            return;
        }

        warn!(session = id, error = %error, "pipeline failed");
        self.observers.clear_latest();
        self.observers
            .close_all(Some(ViewEvent::Failed { error }), DropReason::Shutdown);
        // Own handle; dropping it detaches this thread.
        slot.running.take();
    }

    fn detach(&self, id: SubscriptionId) {
        let stopped = {
            let mut slot = self.session.lock();
            self.observers.unsubscribe(id);
            if self.observers.subscription_count() == 0 {
                slot.running.take()
            } else {
                None
            }
        };
        if let Some(session) = stopped {
            debug!(session = session.id, "last observer detached");
            session.stop();
        }
    }
}

/// An attached observer of the filtered view.
///
/// Dropping it detaches the observer; dropping the last one stops the
/// pipeline.
pub struct ViewSubscription {
    handle: SubscriptionHandle<ViewEvent>,
    view: Arc<ViewInner>,
    state: ViewState,
}

impl ViewSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.handle.id
    }

    /// Block for the next event.
    pub fn recv(&self) -> Result<ViewEvent> {
        self.handle.recv().map_err(|_| SearchError::Disconnected)
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ViewEvent> {
        self.handle.recv_timeout(timeout).ok()
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&self) -> Option<ViewEvent> {
        self.handle.try_recv().ok()
    }

    /// Wait up to `timeout` for the next view, skipping nothing.
    ///
    /// Terminal events come back as errors; a timeout yields `Ok(None)`.
    pub fn next_view(&mut self, timeout: Duration) -> Result<Option<FilteredView>> {
        match self.handle.recv_timeout(timeout) {
            Ok(event) => {
                self.state.apply(&event);
                match event {
                    ViewEvent::View { view } => Ok(Some(view)),
                    ViewEvent::Failed { error } => Err(error),
                    ViewEvent::Dropped { .. } => Err(SearchError::SubscriptionDropped),
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(SearchError::Disconnected),
        }
    }

    /// Apply every pending event and return the resulting state.
    ///
    /// Stops at a terminal event.
    pub fn poll_state(&mut self) -> &ViewState {
        while let Ok(event) = self.handle.try_recv() {
            self.state.apply(&event);
            if event.is_terminal() {
                break;
            }
        }
        &self.state
    }

    /// The state as of the last applied event.
    pub fn state(&self) -> &ViewState {
        &self.state
    }
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        self.view.detach(self.handle.id);
    }
}

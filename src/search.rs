//! Main ContactSearch struct tying all components together.

use crate::debounce::{Debouncer, DEFAULT_DEBOUNCE_WINDOW};
use crate::error::{Result, SearchError};
use crate::highlight::highlight;
use crate::pipeline::{SharedView, ViewSubscription};
use crate::source::DataSource;
use crate::subscriptions::SubscriptionConfig;
use crate::types::{FilteredView, HighlightSpan, Record};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Search configuration.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Quiet period before a typed query settles.
    pub debounce_window: Duration,

    /// Events buffered per observer. An observer that falls further behind
    /// only keeps the newest ones.
    pub buffer_size: usize,

    /// Prefix for the names of spawned threads.
    pub thread_name: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            buffer_size: 64,
            thread_name: "contact-search".to_string(),
        }
    }
}

impl SearchConfig {
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

/// Places a call to a number.
pub trait Dialer {
    fn place_call(&self, number: &str) -> Result<()>;
}

/// A searchable, self-updating contact list.
///
/// Provides a unified interface for:
/// - Gating everything on the contact permission
/// - Submitting raw search keystrokes
/// - Observing the shared filtered view
/// - Highlighting names against the settled query
pub struct ContactSearch {
    /// Search configuration.
    config: SearchConfig,

    /// Raw keystrokes in, settled queries out.
    queries: Arc<Debouncer>,

    /// Shared, replay-latest filtered view. Also holds the permission gate.
    view: SharedView,
}

impl ContactSearch {
    /// Create a search over `source`. Permission starts out not granted.
    pub fn new(source: Arc<dyn DataSource>, config: SearchConfig) -> Result<Self> {
        let queries = Arc::new(Debouncer::with_options(
            config.debounce_window,
            SubscriptionConfig {
                buffer_size: config.buffer_size,
                replay_latest: true,
            },
            &format!("{}-debounce", config.thread_name),
        )?);
        let view = SharedView::new(source, Arc::clone(&queries), &config);

        Ok(Self {
            config,
            queries,
            view,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    // --- Permission ---

    /// Record the current permission grant.
    ///
    /// Revoking drops every observer with `PermissionRevoked` and stops the
    /// pipeline.
    pub fn notify_permission_state(&self, granted: bool) {
        if self.view.set_permitted(granted) {
            info!(granted, "contact permission changed");
        }
    }

    pub fn permission_granted(&self) -> bool {
        self.view.is_permitted()
    }

    // --- Query ---

    /// Submit the raw contents of the search field.
    pub fn submit_query(&self, text: Option<&str>) {
        self.queries.submit(text);
    }

    /// The most recently settled query.
    pub fn settled_query(&self) -> String {
        self.queries.latest()
    }

    // --- View ---

    /// Observe the filtered view: the latest value right away (if one has
    /// been computed), then every update.
    ///
    /// Fails with `PermissionDenied` while the permission is not granted.
    pub fn subscribe_filtered_view(&self) -> Result<ViewSubscription> {
        self.view.subscribe()
    }

    /// The most recently computed view, if any.
    pub fn latest_view(&self) -> Option<FilteredView> {
        self.view.latest()
    }

    pub fn observer_count(&self) -> usize {
        self.view.observer_count()
    }

    /// Whether the watch/load/filter pipeline is running.
    pub fn is_active(&self) -> bool {
        self.view.is_running()
    }

    /// How many times the pipeline has been (re)started.
    pub fn sessions_started(&self) -> u64 {
        self.view.sessions_started()
    }

    // --- Rendering & actions ---

    /// Highlight `name` against the settled query.
    pub fn highlight(&self, name: &str) -> Vec<HighlightSpan> {
        highlight(name, &self.settled_query())
    }

    /// Call the record's number.
    pub fn dial(&self, record: &Record, dialer: &dyn Dialer) -> Result<()> {
        let number = record
            .number
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SearchError::NoNumber(record.name.clone()))?;
        debug!(name = %record.name, "placing call");
        dialer.place_call(number)
    }
}

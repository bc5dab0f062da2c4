//! Filtering a snapshot by a query, and combining the latest of both inputs.

use crate::matching::contains_ignore_case;
use crate::types::{FilteredView, Record, Snapshot};
use std::sync::Arc;

/// Whether a record passes the filter for `query`.
pub fn matches(record: &Record, query: &str) -> bool {
    contains_ignore_case(&record.name, query)
}

/// Compute the filtered view of `snapshot` for `query`.
///
/// Pure and order-preserving. An empty query returns the snapshot's records
/// as-is, sharing the same allocation.
pub fn filter_snapshot(snapshot: &Snapshot, query: &str) -> FilteredView {
    if query.is_empty() {
        return FilteredView::from_parts(snapshot.shared(), String::new());
    }

    let records: Arc<[Record]> = snapshot
        .iter()
        .filter(|record| matches(record, query))
        .cloned()
        .collect();
    FilteredView::from_parts(records, query.to_string())
}

/// Combine-latest over the snapshot and query inputs.
///
/// Each input has a single latest-value slot. Updating either slot
/// recomputes the view from both, once both have been seen.
#[derive(Debug, Default)]
pub struct Combiner {
    snapshot: Option<Snapshot>,
    query: Option<String>,
}

impl Combiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new snapshot. Returns the recomputed view if a query is known.
    pub fn on_snapshot(&mut self, snapshot: Snapshot) -> Option<FilteredView> {
        self.snapshot = Some(snapshot);
        self.compute()
    }

    /// Store a new settled query. Returns the recomputed view if a snapshot is known.
    pub fn on_query(&mut self, query: String) -> Option<FilteredView> {
        self.query = Some(query);
        self.compute()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn compute(&self) -> Option<FilteredView> {
        match (&self.snapshot, &self.query) {
            (Some(snapshot), Some(query)) => Some(filter_snapshot(snapshot, query)),
            _ => None,
        }
    }
}

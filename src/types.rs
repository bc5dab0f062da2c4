//! Core types for the contact search pipeline.

use crate::error::SearchError;
use crate::subscriptions::{DropReason, ViewEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A single contact record.
///
/// Records are immutable values: a changed contact shows up as a new
/// `Record` in the next [`Snapshot`]. `name` is never empty for records that
/// made it into a snapshot.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Display name.
    pub name: String,

    /// Normalized phone number, if the contact has one.
    #[serde(default)]
    pub number: Option<String>,
}

impl Record {
    /// Create a record with a number.
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: Some(number.into()),
        }
    }

    /// Create a record without a number.
    pub fn without_number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: None,
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.number {
            Some(number) => write!(f, "Record({:?}, {:?})", self.name, number),
            None => write!(f, "Record({:?})", self.name),
        }
    }
}

/// A row as handed out by a data source, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

impl RawRecord {
    pub fn new(name: Option<&str>, number: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            number: number.map(str::to_string),
        }
    }

    /// Validate into a [`Record`]. Rows with a missing or empty name are rejected.
    pub fn into_record(self) -> Option<Record> {
        match self.name {
            Some(name) if !name.is_empty() => Some(Record {
                name,
                number: self.number,
            }),
            _ => None,
        }
    }
}

impl From<Record> for RawRecord {
    fn from(record: Record) -> Self {
        Self {
            name: Some(record.name),
            number: record.number,
        }
    }
}

/// All records as of the most recent successful load.
///
/// Cheap to clone; the record slice is shared and never mutated after
/// construction.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    records: Arc<[Record]>,
}

impl Snapshot {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Build a snapshot from raw rows, dropping malformed ones.
    ///
    /// Returns the snapshot and the number of rows that were skipped.
    pub fn from_raw<I>(rows: I) -> (Self, usize)
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut skipped = 0;
        let records: Vec<Record> = rows
            .into_iter()
            .filter_map(|row| {
                let record = row.into_record();
                if record.is_none() {
                    skipped += 1;
                }
                record
            })
            .collect();
        (Self::new(records), skipped)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn shared(&self) -> Arc<[Record]> {
        Arc::clone(&self.records)
    }
}

impl Deref for Snapshot {
    type Target = [Record];

    fn deref(&self) -> &[Record] {
        &self.records
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({} records)", self.records.len())
    }
}

/// The subsequence of a snapshot whose names contain the query.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredView {
    records: Arc<[Record]>,

    /// The settled query this view was computed for.
    query: String,
}

impl FilteredView {
    pub(crate) fn from_parts(records: Arc<[Record]>, query: String) -> Self {
        Self { records, query }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Copy the records out, e.g. for comparison in tests.
    pub fn to_vec(&self) -> Vec<Record> {
        self.records.to_vec()
    }
}

impl Deref for FilteredView {
    type Target = [Record];

    fn deref(&self) -> &[Record] {
        &self.records
    }
}

impl fmt::Debug for FilteredView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredView")
            .field("query", &self.query)
            .field("records", &self.records)
            .finish()
    }
}

/// One piece of a highlighted name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub text: String,
    pub emphasized: bool,
}

impl HighlightSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: false,
        }
    }

    pub fn emphasized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: true,
        }
    }
}

/// What an observer currently knows about the filtered view.
///
/// Keeps "nothing loaded yet", "loaded but nothing matched" and "failed"
/// apart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    Loading,
    Ready(FilteredView),
    Failed(SearchError),
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn view(&self) -> Option<&FilteredView> {
        match self {
            ViewState::Ready(view) => Some(view),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SearchError> {
        match self {
            ViewState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Fold an observed event into the state.
    pub fn apply(&mut self, event: &ViewEvent) {
        *self = match event {
            ViewEvent::View { view } => ViewState::Ready(view.clone()),
            ViewEvent::Failed { error } => ViewState::Failed(error.clone()),
            ViewEvent::Dropped {
                reason: DropReason::PermissionRevoked,
            } => ViewState::Failed(SearchError::PermissionDenied),
            ViewEvent::Dropped { .. } => ViewState::Failed(SearchError::SubscriptionDropped),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_without_name_is_rejected() {
        assert_eq!(RawRecord::new(None, Some("123")).into_record(), None);
        assert_eq!(RawRecord::new(Some(""), Some("123")).into_record(), None);
        assert_eq!(
            RawRecord::new(Some("Tom"), None).into_record(),
            Some(Record::without_number("Tom"))
        );
    }

    #[test]
    fn test_snapshot_from_raw_counts_skipped() {
        let rows = vec![
            RawRecord::new(Some("Simon"), Some("23465123")),
            RawRecord::new(None, Some("000")),
            RawRecord::new(Some(""), None),
            RawRecord::new(Some("Amber"), Some("356345623")),
        ];

        let (snapshot, skipped) = Snapshot::from_raw(rows);
        assert_eq!(skipped, 2);
        assert_eq!(
            snapshot.records(),
            &[
                Record::new("Simon", "23465123"),
                Record::new("Amber", "356345623")
            ]
        );
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(Record::new("Zoe", "788572434")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Zoe", "number": "788572434"}));

        let parsed: Record = serde_json::from_str(r#"{"name": "Will"}"#).unwrap();
        assert_eq!(parsed, Record::without_number("Will"));
    }

    #[test]
    fn test_view_state_accessors() {
        let state = ViewState::default();
        assert!(state.is_loading());
        assert!(state.view().is_none());

        let failed = ViewState::Failed(SearchError::SourceUnavailable("gone".into()));
        assert!(failed.error().is_some());
        assert!(!failed.is_loading());
    }

    #[test]
    fn test_view_state_distinguishes_empty_from_loading_and_failed() {
        let mut state = ViewState::default();
        state.apply(&ViewEvent::View {
            view: FilteredView::default(),
        });
        assert_eq!(state.view().map(|v| v.is_empty()), Some(true));
        assert!(!state.is_loading());

        state.apply(&ViewEvent::Failed {
            error: SearchError::SourceUnavailable("provider crashed".into()),
        });
        assert!(state.view().is_none());
        assert!(state.error().is_some());

        state.apply(&ViewEvent::Dropped {
            reason: DropReason::Shutdown,
        });
        assert_eq!(state, ViewState::Failed(SearchError::SubscriptionDropped));
    }
}

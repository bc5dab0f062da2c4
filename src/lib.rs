//! # Contact Search
//!
//! A live, searchable contact list: it follows a change-notifying data source
//! and a stream of search keystrokes, and shares one filtered result among
//! any number of observers.
//!
//! ## Core Concepts
//!
//! - **Debouncer**: raw keystrokes settle into a query after a quiet window
//! - **ChangeWatcher**: source change callbacks become a coalesced trigger
//! - **SnapshotLoader**: each trigger loads the full record set off-thread
//! - **Combiner**: latest snapshot + latest query = filtered view
//! - **SharedView**: replay-latest multicast, pipeline runs while observed
//! - **Highlighter**: splits a name into emphasized/plain spans
//!
//! ## Example
//!
//! ```ignore
//! use contact_search::{ContactSearch, InMemorySource, SearchConfig, ViewEvent};
//! use std::sync::Arc;
//!
//! let search = ContactSearch::new(Arc::new(InMemorySource::demo()), SearchConfig::default())?;
//! search.notify_permission_state(true);
//!
//! let observer = search.subscribe_filtered_view()?;
//! search.submit_query(Some("am"));
//!
//! while let Ok(ViewEvent::View { view }) = observer.recv() {
//!     for record in view.iter() {
//!         let spans = search.highlight(&record.name);
//!         // render spans...
//!     }
//! }
//! ```

pub mod debounce;
pub mod error;
pub mod filter;
pub mod highlight;
pub mod matching;
pub mod pipeline;
pub mod search;
pub mod snapshot;
pub mod source;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use debounce::{Debouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use error::{Result, SearchError};
pub use filter::{filter_snapshot, matches, Combiner};
pub use highlight::highlight;
pub use matching::{contains_ignore_case, find_ignore_case};
pub use pipeline::{SharedView, ViewSubscription};
pub use search::{ContactSearch, Dialer, SearchConfig};
pub use snapshot::{ChangeWatcher, LoadOutcome, SnapshotLoader};
pub use source::{
    demo_contacts, ChangeCallback, DataSource, InMemorySource, SourceSubscription,
};
pub use subscriptions::{
    DropReason, StreamEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
    SubscriptionManager, ViewEvent,
};
pub use types::*;

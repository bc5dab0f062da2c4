//! Turning change notifications into fresh snapshots.
//!
//! [`ChangeWatcher`] converts the source's push callbacks into a coalesced
//! trigger signal (plus one synthetic trigger at activation), and
//! [`SnapshotLoader`] runs `load_all` off the pipeline thread for each
//! trigger, exposing only the result of the most recently started load.

mod loader;
mod watcher;

pub use loader::{LoadOutcome, SnapshotLoader};
pub use watcher::ChangeWatcher;

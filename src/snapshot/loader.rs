//! Off-thread snapshot loading where the most recently started load wins.

use crate::error::{Result, SearchError};
use crate::source::DataSource;
use crate::types::Snapshot;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// A completed load, tagged with the generation that started it.
#[derive(Debug)]
pub struct LoadOutcome {
    pub generation: u64,
    pub result: Result<Snapshot>,
}

/// Runs `load_all` on a background thread per request.
///
/// Every `start` bumps a generation counter. A load whose generation is no
/// longer the latest when it completes is discarded, so consumers only ever
/// see the most recently *started* load, regardless of finishing order.
pub struct SnapshotLoader {
    source: Arc<dyn DataSource>,
    started: Arc<AtomicU64>,
    completions: Sender<LoadOutcome>,
    thread_name: String,
}

impl SnapshotLoader {
    /// Create a loader and the channel its outcomes are delivered on.
    pub fn new(source: Arc<dyn DataSource>, thread_name: &str) -> (Self, Receiver<LoadOutcome>) {
        let (completions, outcomes) = unbounded();
        let loader = Self {
            source,
            started: Arc::new(AtomicU64::new(0)),
            completions,
            thread_name: thread_name.to_string(),
        };
        (loader, outcomes)
    }

    /// Start a load. Returns its generation.
    pub fn start(&self) -> Result<u64> {
        let generation = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let source = Arc::clone(&self.source);
        let started = Arc::clone(&self.started);
        let completions = self.completions.clone();

        debug!(generation, "snapshot load started");
        thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                let result = source.load_all().map(|rows| {
                    let (snapshot, skipped) = Snapshot::from_raw(rows);
                    if skipped > 0 {
                        debug!(generation, skipped, "skipped records without a name");
                    }
                    snapshot
                });

                if started.load(Ordering::SeqCst) != generation {
                    debug!(generation, "discarding superseded snapshot load");
                    return;
                }
                if let Err(e) = &result {
                    warn!(generation, error = %e, "snapshot load failed");
                }
                // Receiver gone means the pipeline shut down.
                let _ = completions.send(LoadOutcome { generation, result });
            })
            .map_err(|e| SearchError::Spawn(e.to_string()))?;

        Ok(generation)
    }

    /// Whether `generation` is the most recently started load.
    pub fn is_current(&self, generation: u64) -> bool {
        self.started.load(Ordering::SeqCst) == generation
    }

    /// Discard whatever loads are in flight.
    pub fn invalidate(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for SnapshotLoader {
    fn drop(&mut self) {
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use crate::types::{RawRecord, Record};
    use std::time::Duration;

    fn loader_for(source: &InMemorySource) -> (SnapshotLoader, Receiver<LoadOutcome>) {
        SnapshotLoader::new(Arc::new(source.clone()), "test-loader")
    }

    #[test]
    fn test_load_filters_malformed_rows() {
        let source = InMemorySource::with_rows(vec![
            RawRecord::new(Some("Harry"), Some("65473")),
            RawRecord::new(None, Some("1")),
            RawRecord::new(Some(""), Some("2")),
        ]);
        let (loader, outcomes) = loader_for(&source);

        let generation = loader.start().unwrap();
        let outcome = outcomes.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(outcome.generation, generation);
        assert_eq!(
            outcome.result.unwrap().records(),
            &[Record::new("Harry", "65473")]
        );
    }

    #[test]
    fn test_last_started_wins_over_last_finished() {
        let source = InMemorySource::with_records(vec![Record::new("Tom", "1")]);
        let (loader, outcomes) = loader_for(&source);

        // First load reads the old data and finishes last.
        source.queue_load_delay(Duration::from_millis(300));
        let first = loader.start().unwrap();
        thread::sleep(Duration::from_millis(50));

        source.replace(vec![Record::new("Tom", "1"), Record::new("Zoe", "2")]);
        let second = loader.start().unwrap();
        assert!(second > first);

        let outcome = outcomes.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(outcome.generation, second);
        assert_eq!(outcome.result.unwrap().len(), 2);

        // The slow first load completes but is never delivered.
        assert!(outcomes.recv_timeout(Duration::from_millis(500)).is_err());
        assert_eq!(source.load_count(), 2);
    }

    #[test]
    fn test_load_error_is_delivered() {
        let source = InMemorySource::demo();
        source.fail_load(Some("cursor closed"));
        let (loader, outcomes) = loader_for(&source);

        loader.start().unwrap();
        let outcome = outcomes.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(
            outcome.result.unwrap_err(),
            SearchError::SourceUnavailable("cursor closed".into())
        );
    }

    #[test]
    fn test_invalidate_discards_in_flight() {
        let source = InMemorySource::demo();
        source.set_load_delay(Duration::from_millis(100));
        let (loader, outcomes) = loader_for(&source);

        let generation = loader.start().unwrap();
        loader.invalidate();
        assert!(!loader.is_current(generation));
        assert!(outcomes.recv_timeout(Duration::from_millis(400)).is_err());
    }
}

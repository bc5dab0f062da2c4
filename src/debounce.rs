//! Debouncing raw search keystrokes into settled queries.

use crate::error::{Result, SearchError};
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default quiet period before a query settles.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(1000);

enum Command {
    Submit(String),
    Shutdown,
}

/// Turns a burst of submitted values into settled values.
///
/// A value settles once no newer value has been submitted for the quiet
/// window. Later submissions replace a pending one; nothing is queued.
/// Subscribers immediately receive the latest settled value, which is the
/// empty string until something settles.
pub struct Debouncer {
    input: Sender<Command>,
    settled: Arc<SubscriptionManager<String>>,
    worker: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Start a debouncer with the given quiet window.
    pub fn new(window: Duration) -> Result<Self> {
        Self::with_options(window, SubscriptionConfig::default(), "debounce")
    }

    pub(crate) fn with_options(
        window: Duration,
        subscriptions: SubscriptionConfig,
        thread_name: &str,
    ) -> Result<Self> {
        let settled = Arc::new(SubscriptionManager::with_config(subscriptions));
        settled.publish(String::new());

        let (input, commands) = unbounded();
        let publisher = Arc::clone(&settled);
        let worker = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                let mut pending: Option<(String, Instant)> = None;
                loop {
                    let next = match &pending {
                        Some((_, deadline)) => commands.recv_deadline(*deadline),
                        None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    match next {
                        Ok(Command::Submit(value)) => {
                            trace!(query = %value, "query submitted");
                            pending = Some((value, Instant::now() + window));
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if let Some((value, _)) = pending.take() {
                                debug!(query = %value, "query settled");
                                publisher.publish(value);
                            }
                        }
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| SearchError::Spawn(e.to_string()))?;

        Ok(Self {
            input,
            settled,
            worker: Some(worker),
        })
    }

    /// Submit a raw value. `None` is treated as the empty string.
    pub fn submit(&self, value: Option<&str>) {
        let value = value.unwrap_or_default().to_string();
        // Only fails once the worker has exited, i.e. during drop.
        let _ = self.input.send(Command::Submit(value));
    }

    /// Subscribe to settled values, starting with the latest one.
    pub fn subscribe(&self) -> SubscriptionHandle<String> {
        self.settled.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.settled.unsubscribe(id)
    }

    /// The most recently settled value.
    pub fn latest(&self) -> String {
        self.settled.latest().unwrap_or_default()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let _ = self.input.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

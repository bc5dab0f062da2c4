//! Change notifications as a coalesced trigger signal.

use crate::error::Result;
use crate::source::{ChangeCallback, DataSource, SourceSubscription};
use crossbeam_channel::{bounded, Receiver, TrySendError};
use std::sync::Arc;
use tracing::{debug, trace};

/// A change subscription exposed as a single-slot trigger signal.
///
/// The slot holds at most one pending trigger: notifications arriving while
/// a trigger is already pending are coalesced into it. Dropping the watcher
/// cancels the source subscription, including on unwind.
pub struct ChangeWatcher {
    subscription: Box<dyn SourceSubscription>,
    triggers: Receiver<()>,
}

impl ChangeWatcher {
    /// Subscribe to `source` and arm the startup trigger.
    pub fn activate(source: &dyn DataSource) -> Result<Self> {
        let (signal, triggers) = bounded(1);
        // Startup trigger, so there is data before any real change.
        let _ = signal.try_send(());

        let callback: ChangeCallback = Arc::new(move || match signal.try_send(()) {
            Ok(()) => trace!("change trigger armed"),
            Err(TrySendError::Full(())) => trace!("change coalesced into pending trigger"),
            Err(TrySendError::Disconnected(())) => {}
        });
        let subscription = source.subscribe_to_changes(callback)?;
        debug!("change subscription acquired");

        Ok(Self {
            subscription,
            triggers,
        })
    }

    /// The trigger signal, for use in `select!`.
    pub fn triggers(&self) -> &Receiver<()> {
        &self.triggers
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.subscription.cancel();
        debug!("change subscription released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::source::InMemorySource;
    use std::time::Duration;

    fn take(watcher: &ChangeWatcher) -> bool {
        watcher.triggers().try_recv().is_ok()
    }

    #[test]
    fn test_startup_trigger() {
        let source = InMemorySource::demo();
        let watcher = ChangeWatcher::activate(&source).unwrap();
        assert!(take(&watcher));
        assert!(!take(&watcher));
    }

    #[test]
    fn test_notifications_coalesce() {
        let source = InMemorySource::demo();
        let watcher = ChangeWatcher::activate(&source).unwrap();
        assert!(take(&watcher));

        source.notify();
        source.notify();
        source.notify();
        assert!(take(&watcher));
        assert!(!take(&watcher));

        source.remove("Tom");
        assert!(watcher
            .triggers()
            .recv_timeout(Duration::from_millis(100))
            .is_ok());
    }

    #[test]
    fn test_drop_releases_subscription() {
        let source = InMemorySource::demo();
        let watcher = ChangeWatcher::activate(&source).unwrap();
        assert_eq!(source.active_subscriptions(), 1);

        drop(watcher);
        assert_eq!(source.active_subscriptions(), 0);
        // Notifying after release must not panic.
        source.notify();
    }

    #[test]
    fn test_subscribe_failure_propagates() {
        let source = InMemorySource::demo();
        source.fail_subscribe(Some("provider missing"));
        let result = ChangeWatcher::activate(&source);
        assert!(matches!(result, Err(SearchError::SourceUnavailable(_))));
        assert_eq!(source.active_subscriptions(), 0);
    }
}

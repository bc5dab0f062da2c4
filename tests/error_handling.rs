//! Error handling and edge case tests.

use contact_search::{
    highlight, ContactSearch, DropReason, InMemorySource, RawRecord, Record, SearchConfig,
    SearchError, ViewEvent, ViewState,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(3);

fn test_search(source: &InMemorySource) -> ContactSearch {
    let search = ContactSearch::new(
        Arc::new(source.clone()),
        SearchConfig::default().with_debounce_window(Duration::from_millis(50)),
    )
    .unwrap();
    search.notify_permission_state(true);
    search
}

fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// --- Source Errors ---

#[test]
fn test_subscribe_failure_reaches_observer() {
    let source = InMemorySource::demo();
    source.fail_subscribe(Some("provider missing"));
    let search = test_search(&source);

    let mut observer = search.subscribe_filtered_view().unwrap();
    let result = observer.next_view(WAIT);
    assert_eq!(
        result,
        Err(SearchError::SourceUnavailable("provider missing".into()))
    );
    assert!(observer.state().error().is_some());

    // Terminal: nothing follows.
    assert_eq!(observer.next_view(WAIT), Err(SearchError::Disconnected));
    assert!(!search.is_active());
    assert_eq!(source.load_count(), 0);
}

#[test]
fn test_fresh_observer_after_error_restarts_pipeline() {
    let source = InMemorySource::demo();
    source.fail_subscribe(Some("provider missing"));
    let search = test_search(&source);

    let mut failed = search.subscribe_filtered_view().unwrap();
    assert!(failed.next_view(WAIT).is_err());
    assert!(search.latest_view().is_none());

    source.fail_subscribe(None);
    let mut observer = search.subscribe_filtered_view().unwrap();
    let view = observer.next_view(WAIT).unwrap().unwrap();
    assert_eq!(view.len(), 10);
    assert_eq!(search.sessions_started(), 2);
}

#[test]
fn test_load_failure_ends_stream_and_releases_source() {
    let source = InMemorySource::demo();
    let search = test_search(&source);
    let mut observer = search.subscribe_filtered_view().unwrap();
    assert!(observer.next_view(WAIT).unwrap().is_some());

    source.fail_load(Some("cursor closed"));
    source.notify();

    assert_eq!(
        observer.next_view(WAIT),
        Err(SearchError::SourceUnavailable("cursor closed".into()))
    );
    assert!(eventually(|| source.active_subscriptions() == 0));
    assert!(!search.is_active());
}

#[test]
fn test_error_is_distinct_from_empty_and_loading() {
    let source = InMemorySource::demo();
    source.set_load_delay(Duration::from_millis(200));
    let search = test_search(&source);
    let mut observer = search.subscribe_filtered_view().unwrap();

    // Nothing loaded yet.
    assert!(observer.poll_state().is_loading());

    search.submit_query(Some("xyz"));
    let deadline = Instant::now() + WAIT;
    loop {
        match observer.next_view(WAIT).unwrap() {
            Some(view) if view.query() == "xyz" => break,
            Some(_) => {}
            None => panic!("no view"),
        }
        assert!(Instant::now() < deadline);
    }

    // Loaded, nothing matched.
    let state = observer.state().clone();
    assert_eq!(state.view().map(|v| v.is_empty()), Some(true));
    assert!(state.error().is_none());
}

// --- Malformed Records ---

#[test]
fn test_records_without_name_are_excluded() {
    let source = InMemorySource::with_rows(vec![
        RawRecord::new(Some("Peter"), Some("456773")),
        RawRecord::new(None, Some("0000")),
        RawRecord::new(Some(""), Some("1111")),
        RawRecord::new(Some("Cris"), None),
    ]);
    let search = test_search(&source);
    let mut observer = search.subscribe_filtered_view().unwrap();

    let view = observer.next_view(WAIT).unwrap().unwrap();
    assert_eq!(
        view.to_vec(),
        vec![Record::new("Peter", "456773"), Record::without_number("Cris")]
    );
}

// --- Permission ---

#[test]
fn test_revoking_permission_drops_observers() {
    let source = InMemorySource::demo();
    let search = test_search(&source);
    let mut observer = search.subscribe_filtered_view().unwrap();
    assert!(observer.next_view(WAIT).unwrap().is_some());

    search.notify_permission_state(false);
    assert_eq!(
        observer.recv_timeout(WAIT),
        Some(ViewEvent::Dropped {
            reason: DropReason::PermissionRevoked
        })
    );
    assert_eq!(source.active_subscriptions(), 0);
    assert!(matches!(
        search.subscribe_filtered_view(),
        Err(SearchError::PermissionDenied)
    ));

    // Granting again works and replays the cached view.
    search.notify_permission_state(true);
    let mut observer = search.subscribe_filtered_view().unwrap();
    assert!(observer.next_view(WAIT).unwrap().is_some());
    assert_eq!(observer.state(), &ViewState::Ready(search.latest_view().unwrap()));
}

#[test]
fn test_revoke_during_subscribes_leaves_no_pipeline() {
    let source = InMemorySource::demo();
    let search = Arc::new(test_search(&source));

    let subscriber = {
        let search = Arc::clone(&search);
        thread::spawn(move || {
            (0..50)
                .filter_map(|_| search.subscribe_filtered_view().ok())
                .collect::<Vec<_>>()
        })
    };
    thread::sleep(Duration::from_millis(1));
    search.notify_permission_state(false);
    let observers = subscriber.join().unwrap();

    assert!(!search.is_active());
    assert_eq!(search.observer_count(), 0);
    assert_eq!(source.active_subscriptions(), 0);
    drop(observers);
    assert!(!search.is_active());
}

#[test]
fn test_subscribe_before_grant() {
    let source = InMemorySource::demo();
    let search = ContactSearch::new(Arc::new(source.clone()), SearchConfig::default()).unwrap();

    assert!(!search.permission_granted());
    assert!(matches!(
        search.subscribe_filtered_view(),
        Err(SearchError::PermissionDenied)
    ));
    assert_eq!(source.subscribe_count(), 0);
}

// --- Highlighting Edge Cases ---

#[test]
fn test_highlight_never_loops_on_empty_query() {
    let spans = highlight("Harry", "");
    assert_eq!(spans.len(), 1);
    assert!(!spans[0].emphasized);
}

#[test]
fn test_highlight_query_longer_than_name() {
    let spans = highlight("Cris", "Christopher");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, "Cris");
}

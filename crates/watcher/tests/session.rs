//! Watch session tests against the in-memory backend

mod common;

use common::{recording_subscribers, wait_for, FakeProbe, ManualFactory};
use fsnorm_watcher::{
    NormalizedEvent, RawNotification, Subscribers, ThreadContext, WatchConfig, WatchError,
    WatchSession,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

fn session(
    root: &TempDir,
    config: impl FnOnce(WatchConfig) -> WatchConfig,
    subscribers: Subscribers,
) -> (WatchSession, ManualFactory) {
    let factory = ManualFactory::new();
    let session = WatchSession::builder(config(WatchConfig::new(root.path())))
        .subscribers(subscribers)
        .factory(Arc::new(factory.clone()))
        .probe(Arc::new(FakeProbe::default()))
        .start()
        .unwrap();
    (session, factory)
}

#[test]
fn test_burst_is_normalized_before_dispatch() {
    let root = TempDir::new().unwrap();
    let (subscribers, events, _) = recording_subscribers();
    let (mut session, factory) = session(&root, |c| c, subscribers);

    let a = root.path().join("a.txt");
    let b = root.path().join("b.txt");
    factory.emit(root.path(), RawNotification::created(&a));
    factory.emit(root.path(), RawNotification::changed(&a));
    factory.emit(root.path(), RawNotification::changed(&a));
    factory.emit(root.path(), RawNotification::renamed(&a, &b));

    assert!(wait_for(WAIT, || !events.lock().is_empty()));
    std::thread::sleep(Duration::from_millis(150));

    assert_eq!(*events.lock(), vec![NormalizedEvent::created(&b)]);
    session.stop().unwrap();
}

#[test]
fn test_subscribers_receive_root_as_source() {
    let root = TempDir::new().unwrap();
    let sources = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&sources);
    let subscribers = Subscribers::new().on_deleted(move |source, _| {
        recorder.lock().push(source.to_path_buf());
        Ok(())
    });
    let (mut session, factory) = session(&root, |c| c, subscribers);

    factory.emit(root.path(), RawNotification::deleted(root.path().join("gone")));

    assert!(wait_for(WAIT, || !sources.lock().is_empty()));
    assert_eq!(*sources.lock(), vec![root.path().to_path_buf()]);
    session.stop().unwrap();
}

#[test]
fn test_backend_errors_reach_error_subscriber() {
    let root = TempDir::new().unwrap();
    let (subscribers, events, errors) = recording_subscribers();
    let (mut session, factory) = session(&root, |c| c, subscribers);

    factory.emit_error(root.path(), WatchError::Overflow(root.path().to_path_buf()));

    assert!(wait_for(WAIT, || errors.lock().len() == 1));
    assert!(errors.lock()[0].contains("overflowed"));
    assert!(events.lock().is_empty());
    assert!(session.is_running());
    session.stop().unwrap();
}

#[test]
fn test_subscriber_error_ends_processing() {
    let root = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let subscribers = Subscribers::new().on_created(move |_, event| {
        *counter.lock() += 1;
        anyhow::bail!("cannot handle {}", event.full_path.display())
    });
    let (mut session, factory) = session(&root, |c| c, subscribers);

    factory.emit(root.path(), RawNotification::created(root.path().join("a")));
    assert!(wait_for(WAIT, || !session.is_running()));

    // Later notifications are never delivered
    factory.emit(root.path(), RawNotification::created(root.path().join("b")));
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(*calls.lock(), 1);

    let err = session.stop().unwrap_err();
    assert!(format!("{:#}", err).contains("cannot handle"));

    // Second stop is a no-op
    assert!(session.stop().is_ok());
}

#[test]
fn test_stop_discards_partial_batch_and_releases_watchers() {
    let root = TempDir::new().unwrap();
    let (subscribers, events, _) = recording_subscribers();
    let (mut session, factory) = session(
        &root,
        |c| c.delay(Duration::from_secs(30)),
        subscribers,
    );

    factory.emit(root.path(), RawNotification::created(root.path().join("a")));
    session.stop().unwrap();

    assert!(events.lock().is_empty());
    assert!(factory.active().is_empty());
    assert_eq!(factory.stopped(), vec![root.path().to_path_buf()]);
    assert!(!session.is_running());
}

#[test]
fn test_missing_root_is_an_error() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("does-not-exist");
    let factory = ManualFactory::new();

    let err = WatchSession::builder(WatchConfig::new(&missing))
        .factory(Arc::new(factory.clone()))
        .start()
        .err()
        .unwrap();

    assert!(matches!(
        err.downcast_ref::<WatchError>(),
        Some(WatchError::RootNotFound(path)) if path == &missing
    ));
    assert!(factory.started().is_empty());
}

#[test]
fn test_file_root_is_an_error() {
    let root = TempDir::new().unwrap();
    let file = root.path().join("plain.txt");
    std::fs::write(&file, b"x").unwrap();

    let err = WatchSession::builder(WatchConfig::new(&file))
        .factory(Arc::new(ManualFactory::new()))
        .start()
        .err()
        .unwrap();
    assert!(matches!(
        err.downcast_ref::<WatchError>(),
        Some(WatchError::NotADirectory(_))
    ));
}

#[test]
fn test_options_forwarded_to_backend() {
    let root = TempDir::new().unwrap();
    let (mut session, factory) = session(
        &root,
        |c| c.recursive(true).filter("*.txt"),
        Subscribers::new(),
    );

    let started = factory.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].path, root.path());
    assert!(started[0].recursive);
    assert!(started[0].filters.matches(&root.path().join("a.txt")));
    assert!(!started[0].filters.matches(&root.path().join("a.rs")));
    assert_eq!(session.watched_paths(), vec![root.path().to_path_buf()]);

    session.stop().unwrap();
}

#[test]
fn test_thread_context_runs_subscribers_on_callback_thread() {
    let root = TempDir::new().unwrap();
    let names = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&names);
    let subscribers = Subscribers::new().on_created(move |_, _| {
        recorder
            .lock()
            .push(std::thread::current().name().unwrap_or_default().to_string());
        Ok(())
    });

    let factory = ManualFactory::new();
    let mut session = WatchSession::builder(WatchConfig::new(root.path()))
        .subscribers(subscribers)
        .factory(Arc::new(factory.clone()))
        .probe(Arc::new(FakeProbe::default()))
        .context(Arc::new(ThreadContext::spawn("ui-thread").unwrap()))
        .start()
        .unwrap();

    factory.emit(root.path(), RawNotification::created(root.path().join("a")));

    assert!(wait_for(WAIT, || !names.lock().is_empty()));
    assert_eq!(*names.lock(), vec!["ui-thread".to_string()]);
    session.stop().unwrap();
}

#[test]
fn test_invalid_filter_is_rejected() {
    let root = TempDir::new().unwrap();
    let result = WatchSession::builder(WatchConfig::new(root.path()).filter("[oops"))
        .factory(Arc::new(ManualFactory::new()))
        .start();
    assert!(result.is_err());
}

#[test]
fn test_root_deletion_then_stop_releases_root_watcher() {
    let root = TempDir::new().unwrap();
    let (subscribers, events, _) = recording_subscribers();
    let (mut session, factory) = session(&root, |c| c, subscribers);

    factory.emit(root.path(), RawNotification::deleted(root.path()));
    assert!(wait_for(WAIT, || !events.lock().is_empty()));
    assert_eq!(*events.lock(), vec![NormalizedEvent::deleted(root.path())]);
    assert!(factory.stopped().is_empty());

    session.stop().unwrap();

    assert_eq!(factory.stopped(), vec![root.path().to_path_buf()]);
    assert!(factory.stopped_in_callback().is_empty());
    assert!(factory.active().is_empty());
}

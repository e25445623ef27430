//! Common utilities for watcher integration tests
//!
//! `ManualFactory` stands in for the native backend: tests push raw
//! notifications into a registered watcher by path.

#![allow(dead_code)]

use fsnorm_watcher::{
    FsProbe, NormalizedEvent, RawNotification, RawSink, RawWatcher, RawWatcherFactory,
    Subscribers, WatchError, WatchOptions,
};
use parking_lot::Mutex;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

thread_local! {
    /// Set while a sink call made by `emit` is running on this thread
    static IN_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// Run `f` flagged as a backend callback
fn as_callback<R>(f: impl FnOnce() -> R) -> R {
    IN_CALLBACK.with(|flag| flag.set(true));
    let result = f();
    IN_CALLBACK.with(|flag| flag.set(false));
    result
}

#[derive(Default)]
struct FactoryState {
    sinks: HashMap<PathBuf, Arc<dyn RawSink>>,
    started: Vec<WatchOptions>,
    stopped: Vec<PathBuf>,
    /// Watchers stopped from inside one of their own callbacks
    stopped_in_callback: Vec<PathBuf>,
    failing: HashSet<PathBuf>,
}

/// In-memory raw watcher backend
#[derive(Clone, Default)]
pub struct ManualFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl ManualFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `start` fail for `path`
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing.insert(path.into());
    }

    /// Deliver a notification through the watcher registered for `watcher`
    pub fn emit(&self, watcher: &Path, notification: RawNotification) {
        let sink = self.state.lock().sinks.get(watcher).cloned();
        match sink {
            Some(sink) => as_callback(|| sink.notify(notification)),
            None => panic!("no active watcher for {}", watcher.display()),
        }
    }

    /// Deliver an error through the watcher registered for `watcher`
    pub fn emit_error(&self, watcher: &Path, error: WatchError) {
        let sink = self.state.lock().sinks.get(watcher).cloned();
        if let Some(sink) = sink {
            as_callback(|| sink.error(error));
        }
    }

    /// Paths with a running watcher, sorted
    pub fn active(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.state.lock().sinks.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn started(&self) -> Vec<WatchOptions> {
        self.state.lock().started.clone()
    }

    pub fn stopped(&self) -> Vec<PathBuf> {
        self.state.lock().stopped.clone()
    }

    /// Watchers a real backend would have deadlocked on
    pub fn stopped_in_callback(&self) -> Vec<PathBuf> {
        self.state.lock().stopped_in_callback.clone()
    }
}

impl RawWatcherFactory for ManualFactory {
    fn start(
        &self,
        options: &WatchOptions,
        sink: Arc<dyn RawSink>,
    ) -> fsnorm_watcher::error::Result<Box<dyn RawWatcher>> {
        let mut state = self.state.lock();
        if state.failing.contains(&options.path) {
            return Err(WatchError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "access denied",
            )));
        }

        state.sinks.insert(options.path.clone(), sink);
        state.started.push(options.clone());

        Ok(Box::new(ManualWatcher {
            path: options.path.clone(),
            state: Arc::clone(&self.state),
            stopped: false,
        }))
    }
}

struct ManualWatcher {
    path: PathBuf,
    state: Arc<Mutex<FactoryState>>,
    stopped: bool,
}

impl RawWatcher for ManualWatcher {
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let mut state = self.state.lock();
        state.sinks.remove(&self.path);
        state.stopped.push(self.path.clone());
        if IN_CALLBACK.with(Cell::get) {
            state.stopped_in_callback.push(self.path.clone());
        }
    }
}

impl Drop for ManualWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// File system probe with a fixed set of symlinked directories
#[derive(Clone, Default)]
pub struct FakeProbe {
    links: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeProbe {
    pub fn with_links<P: AsRef<Path>>(links: &[P]) -> Self {
        let probe = Self::default();
        for link in links {
            probe.add_link(link.as_ref());
        }
        probe
    }

    pub fn add_link(&self, path: &Path) {
        self.links.lock().push(path.to_path_buf());
    }
}

impl FsProbe for FakeProbe {
    fn is_symlink_dir(&self, path: &Path) -> bool {
        self.links.lock().iter().any(|link| link == path)
    }

    fn symlinked_dirs(&self, root: &Path) -> Vec<PathBuf> {
        self.links
            .lock()
            .iter()
            .filter(|link| link.starts_with(root) && link.as_path() != root)
            .cloned()
            .collect()
    }
}

/// Subscribers that record every delivered event and error
pub fn recording_subscribers() -> (Subscribers, Arc<Mutex<Vec<NormalizedEvent>>>, Arc<Mutex<Vec<String>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&events);
    let error_sink = Arc::clone(&errors);
    let subscribers = Subscribers::new()
        .on_any(move |_, event| {
            sink.lock().push(event.clone());
            Ok(())
        })
        .on_error(move |_, error| {
            error_sink.lock().push(error.to_string());
            Ok(())
        });

    (subscribers, events, errors)
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

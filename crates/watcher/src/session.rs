//! Watch session lifecycle
//!
//! A session owns the whole pipeline for one root:
//!
//! ```text
//! raw watchers -> EventQueue -> consumer thread -> Debouncer (timer thread)
//!                                      ^                 |
//!                                      +-- normalized ---+
//!                                      |
//!                                      v
//!                                  Dispatcher -> subscribers
//! ```
//!
//! Subscribers run on the consumer thread (or the configured dispatch
//! context), never under the debounce lock. A failing subscriber ends the
//! consumer loop; the error is returned from [`WatchSession::stop`].

use crate::config::WatchConfig;
use crate::debounce::Debouncer;
use crate::dispatch::{DispatchContext, Dispatcher, Subscribers};
use crate::error::WatchError;
use crate::filters::FilenameFilter;
use crate::platform::NotifyWatcherFactory;
use crate::queue::{EventQueue, QueueItem};
use crate::raw::{RawSink, RawWatcherFactory, WatchOptions};
use crate::symlink::{FsProbe, StdProbe, SymlinkWatcherSet};
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use fsnorm_core::NormalizedEvent;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Builder for a [`WatchSession`]
pub struct WatchSessionBuilder {
    config: WatchConfig,
    subscribers: Subscribers,
    context: Option<Arc<dyn DispatchContext>>,
    factory: Arc<dyn RawWatcherFactory>,
    probe: Arc<dyn FsProbe>,
}

impl WatchSessionBuilder {
    pub fn subscribers(mut self, subscribers: Subscribers) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Marshal subscriber calls onto `context`
    pub fn context(mut self, context: Arc<dyn DispatchContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Replace the native raw watcher backend
    pub fn factory(mut self, factory: Arc<dyn RawWatcherFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Replace the file system probe used for symlink discovery
    pub fn probe(mut self, probe: Arc<dyn FsProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Validate the configuration, register raw watchers and start processing
    pub fn start(self) -> Result<WatchSession> {
        let config = self.config;
        config.validate().context("Invalid watch configuration")?;

        let root = config.root.clone();
        if !root.exists() {
            return Err(WatchError::RootNotFound(root).into());
        }
        if !root.is_dir() {
            return Err(WatchError::NotADirectory(root).into());
        }

        let filters = FilenameFilter::new(&config.filters).context("Invalid filename filters")?;
        let options = WatchOptions {
            path: root.clone(),
            recursive: config.recursive,
            notify_filters: config.notify_filters,
            filters: Arc::new(filters),
        };

        let (queue_tx, queue_rx) = EventQueue::new().split();
        let (debouncer, flushed) = Debouncer::spawn(
            config.debounce.delay(),
            config.debounce.spam_threshold(),
        )
        .context("Failed to start debounce timer")?;

        let sink: Arc<dyn RawSink> = Arc::new(queue_tx);
        let watchers = SymlinkWatcherSet::new(options, self.factory, self.probe, sink);
        watchers
            .init()
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        let dispatcher = Dispatcher::new(root.clone(), self.subscribers, self.context);
        let (cancel_tx, cancel_rx) = bounded(1);
        let debouncer = Arc::new(debouncer);

        let consumer = {
            let debouncer = Arc::clone(&debouncer);
            thread::Builder::new()
                .name("fsnorm-debouncer".to_string())
                .spawn(move || {
                    run_consumer(queue_rx, flushed, cancel_rx, &debouncer, &dispatcher)
                })
                .context("Failed to spawn consumer thread")?
        };

        info!(
            "Watch session started for {} ({} raw watchers)",
            root.display(),
            watchers.len()
        );

        Ok(WatchSession {
            root,
            watchers,
            debouncer,
            cancel: Some(cancel_tx),
            consumer: Some(consumer),
        })
    }
}

/// Running watch over one root directory
pub struct WatchSession {
    root: PathBuf,
    watchers: SymlinkWatcherSet,
    debouncer: Arc<Debouncer>,
    cancel: Option<Sender<()>>,
    consumer: Option<JoinHandle<Result<()>>>,
}

impl WatchSession {
    pub fn builder(config: WatchConfig) -> WatchSessionBuilder {
        WatchSessionBuilder {
            config,
            subscribers: Subscribers::default(),
            context: None,
            factory: Arc::new(NotifyWatcherFactory),
            probe: Arc::new(StdProbe),
        }
    }

    /// Start a session with the native backend
    pub fn start(config: WatchConfig, subscribers: Subscribers) -> Result<Self> {
        Self::builder(config).subscribers(subscribers).start()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directories with an active raw watcher
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watchers.watched_paths()
    }

    /// False once stopped or after a subscriber failure ended processing
    pub fn is_running(&self) -> bool {
        self.consumer.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop watching
    ///
    /// Releases every raw watcher and discards the partial batch. Returns the
    /// error that ended processing early, if any. Calling it again is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        let Some(consumer) = self.consumer.take() else {
            return Ok(());
        };

        self.watchers.stop();
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }

        let result = consumer
            .join()
            .map_err(|_| anyhow!("consumer thread panicked"))?;

        self.debouncer.shutdown();
        info!("Watch session stopped for {}", self.root.display());
        result
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Watch session for {} ended with error: {:#}", self.root.display(), e);
        }
    }
}

fn run_consumer(
    queue: Receiver<QueueItem>,
    flushed: Receiver<Vec<NormalizedEvent>>,
    cancel: Receiver<()>,
    debouncer: &Debouncer,
    dispatcher: &Dispatcher,
) -> Result<()> {
    let result = consume(&queue, &flushed, &cancel, debouncer, dispatcher);
    if let Err(e) = &result {
        error!("Event processing stopped: {:#}", e);
    }
    result
}

fn consume(
    queue: &Receiver<QueueItem>,
    flushed: &Receiver<Vec<NormalizedEvent>>,
    cancel: &Receiver<()>,
    debouncer: &Debouncer,
    dispatcher: &Dispatcher,
) -> Result<()> {
    loop {
        select! {
            recv(cancel) -> _ => {
                debug!("consumer cancelled with {} pending notifications", debouncer.pending());
                return Ok(());
            }
            recv(queue) -> item => match item {
                Ok(QueueItem::Raw(notification)) => debouncer.record(notification),
                Ok(QueueItem::Error(e)) => dispatcher
                    .dispatch_error(e)
                    .context("Error subscriber failed")?,
                Err(_) => return Ok(()),
            },
            recv(flushed) -> events => match events {
                Ok(events) => dispatcher
                    .dispatch_all(events)
                    .context("Event subscriber failed")?,
                Err(_) => return Ok(()),
            },
        }
    }
}
